// Hardware drivers and storage, board-independent.
//
// Pin assignments and bus wiring live in board/.

pub mod display;
pub mod sdcard;
pub mod ssd1351;
pub mod storage;
