// 재생 계층 - 세션당 디코딩 스레드, 프레임 큐, 상태
pub mod frame_queue;
pub mod player;
pub mod state;

pub use frame_queue::{FrameQueue, Timed};
pub use player::{AudioFormat, Player, VideoFormat};
pub use state::DecoderState;
