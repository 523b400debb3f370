//! The data model: atoms, bonds, comments, and the value types they're
//! built from.

pub mod atom;
pub mod bond;
pub mod comment;
pub mod types;

pub use atom::{Atom, IssueType, Priority, Status};
pub use bond::{Bond, DependencyType};
pub use comment::Comment;
pub use types::{AtomId, CommentId, ErrorKind, RepoName, Ulid, ValidationError};
