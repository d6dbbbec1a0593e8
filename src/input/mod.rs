pub mod keymap;
pub mod router;
