#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    SelectionChanged { items: usize },
    VisibilityChanged { items: usize },
    StructureChanged,
    PosesChanged,
    RedrawRequested,
    Message(String),
}

pub type EventCallback<'a> = Box<dyn Fn(SyncEvent) + 'a>;

#[derive(Default)]
pub struct EventReporter<'a> {
    callback: Option<EventCallback<'a>>,
}

impl<'a> EventReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: EventCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: SyncEvent) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
