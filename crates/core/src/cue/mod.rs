pub mod cue;
pub mod cue_sync;
pub mod track;
