pub mod dialog;
pub mod effect;
pub mod quest;
pub mod state;
pub mod world;
