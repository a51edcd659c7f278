use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    MeetingCancelledEvent,
    MeetingDeliveredEvent,
    MeetingLockedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub meeting_locked_producer: Vec<EventProducer<MeetingLockedEvent>>,
    pub meeting_cancelled_producer: Vec<EventProducer<MeetingCancelledEvent>>,
    pub meeting_delivered_producer: Vec<EventProducer<MeetingDeliveredEvent>>,
}

pub struct EventHandlers {
    pub on_meeting_locked: Option<EventHandler<MeetingLockedEvent>>,
    pub on_meeting_cancelled: Option<EventHandler<MeetingCancelledEvent>>,
    pub on_meeting_delivered: Option<EventHandler<MeetingDeliveredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_meeting_locked = hooks.on_meeting_locked.map(|f| EventHandler::new(buffer_size, f));
        let on_meeting_cancelled = hooks.on_meeting_cancelled.map(|f| EventHandler::new(buffer_size, f));
        let on_meeting_delivered = hooks.on_meeting_delivered.map(|f| EventHandler::new(buffer_size, f));
        Self { on_meeting_locked, on_meeting_cancelled, on_meeting_delivered }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_meeting_locked {
            result.meeting_locked_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_meeting_cancelled {
            result.meeting_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_meeting_delivered {
            result.meeting_delivered_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_meeting_locked {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_meeting_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_meeting_delivered {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_meeting_locked: Option<Handler<MeetingLockedEvent>>,
    pub on_meeting_cancelled: Option<Handler<MeetingCancelledEvent>>,
    pub on_meeting_delivered: Option<Handler<MeetingDeliveredEvent>>,
}

impl EventHooks {
    pub fn on_meeting_locked<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MeetingLockedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_meeting_locked = Some(Arc::new(f));
        self
    }

    pub fn on_meeting_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MeetingCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_meeting_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_meeting_delivered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MeetingDeliveredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_meeting_delivered = Some(Arc::new(f));
        self
    }
}
