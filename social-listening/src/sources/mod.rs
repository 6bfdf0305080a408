pub mod scripted;

pub use scripted::{ScriptedPage, ScriptedSource};
