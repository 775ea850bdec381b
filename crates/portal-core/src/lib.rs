//! Portal Core Library
//!
//! Core of a teacher/student portal: a teacher profile, a student roster
//! with marks, quick links and free-form page sections, kept in a local
//! cache and reconciled with a hosted remote store.
//!
//! # Architecture
//!
//! - **Local store**: durable key/value snapshots, read once at start and
//!   rewritten on every commit (source of truth while offline)
//! - **Remote store**: shared copy with realtime change events
//! - **Portal**: single-writer session owning the view model
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut portal = Portal::open(&config)?;
//! portal.boot().await;
//!
//! portal.enter_admin("admin@mathportal.com");
//! portal.create_student(NewStudent::new("Asha", "Class 12"))?;
//!
//! portal.shutdown().await;
//! ```
//!
//! # Modules
//!
//! - `portal`: the session object (main entry point)
//! - `store`: view model with write-through
//! - `sync`: hydration, realtime merge and the outbound queue
//! - `local`: local store adapters
//! - `remote`: remote store adapters
//! - `confirm`: pending-confirmation state machine
//! - `directory`: public directory queries
//! - `chat`: math tutor chat
//! - `config`: application configuration

pub mod chat;
pub mod config;
pub mod confirm;
pub mod directory;
pub mod error;
pub mod local;
pub mod models;
pub mod portal;
pub mod remote;
pub mod seed;
pub mod store;
pub mod sync;

pub use chat::{ChatService, Conversation, OpenRouterChat};
pub use config::{ChatConfig, Config, LocalBackend};
pub use confirm::{Confirmation, PendingAction, PendingKind, Severity};
pub use directory::{DirectoryFilter, LinkKind};
pub use error::{PortalError, PortalResult};
pub use local::{LocalStore, StorageError};
pub use models::{
    ChatMessage, ChatRole, Collection, CustomSection, LinkField, NewStudent, QuickLink,
    SectionPatch, SectionTheme, Student, StudentLink, TeacherProfile,
};
pub use portal::Portal;
pub use remote::{MemoryRemote, RemoteError, RemoteStore, SupabaseRemote};
pub use store::{PortalStore, SessionFlags};
pub use sync::{AppliedChange, SyncCoordinator};
