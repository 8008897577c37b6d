// ABOUTME: Editing layer for Playground projects
// ABOUTME: Buffer tracking, structural tree edits and the session that keeps store, buffers and sandbox in step

pub mod buffers;
pub mod error;
pub mod mutator;
pub mod session;

pub use buffers::{BufferManager, OpenBuffer};
pub use error::{SessionError, SessionResult};
pub use mutator::{Mutation, TreeMutator};
pub use session::{EditorSession, SaveReport};
