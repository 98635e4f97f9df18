//! In-process domain events
//!
//! Services publish a [`DomainEvent`] after a successful write; listeners
//! registered on the [`EventBus`] react to it (activity logging, account
//! provisioning). Listeners run in priority order on the publishing task.
//! A failing listener is logged and does not stop the others or fail the
//! write that triggered it.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::models::{Course, Program, Upload, UploadVideo, User};

/// Listener priority (lower = earlier)
pub const PRIORITY_EARLY: i32 = -100;
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_LATE: i32 = 100;

/// Something that happened to a stored entity
#[derive(Debug, Clone)]
pub enum DomainEvent {
    ProgramSaved { program: Program, created: bool },
    ProgramDeleted { program: Program },
    CourseSaved { course: Course, created: bool },
    CourseDeleted { course: Course },
    UploadSaved { upload: Upload, course: Course, created: bool },
    UploadDeleted { upload: Upload, course: Course },
    VideoSaved { video: UploadVideo, course: Course, created: bool },
    VideoDeleted { video: UploadVideo, course: Course },
    /// A user row was inserted. Credential updates never emit this.
    UserCreated { user: User },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ProgramSaved { .. } => "program_saved",
            DomainEvent::ProgramDeleted { .. } => "program_deleted",
            DomainEvent::CourseSaved { .. } => "course_saved",
            DomainEvent::CourseDeleted { .. } => "course_deleted",
            DomainEvent::UploadSaved { .. } => "upload_saved",
            DomainEvent::UploadDeleted { .. } => "upload_deleted",
            DomainEvent::VideoSaved { .. } => "video_saved",
            DomainEvent::VideoDeleted { .. } => "video_deleted",
            DomainEvent::UserCreated { .. } => "user_created",
        }
    }
}

/// Reacts to domain events
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

struct Subscription {
    listener: Arc<dyn EventListener>,
    priority: i32,
}

/// Priority-ordered listener registry
pub struct EventBus {
    listeners: RwLock<Vec<Subscription>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. Listeners with equal priority run in registration order.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>, priority: i32) {
        let name = listener.name();
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.push(Subscription { listener, priority });
        listeners.sort_by_key(|s| s.priority);
        debug!("Registered event listener '{}' with priority {}", name, priority);
    }

    /// Deliver an event to every listener in priority order
    pub async fn publish(&self, event: DomainEvent) {
        // Snapshot so no lock is held across awaits
        let listeners: Vec<Arc<dyn EventListener>> = {
            let guard = self.listeners.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|s| s.listener.clone()).collect()
        };

        for listener in listeners {
            if let Err(e) = listener.handle(&event).await {
                warn!(
                    "Event listener '{}' failed on {}: {:#}",
                    listener.name(),
                    event.name(),
                    e
                );
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }
}
