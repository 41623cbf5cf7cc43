// Diary lifecycle: create/update/delete hooks that keep derived data
// (embedding, solution, feedback log) consistent with the entry text,
// plus the calendar read surface.

pub mod handlers;
pub mod service;
