// 디코더 코어 - 세션(소스 1개) 단위 패킷 → 프레임 디코딩
// 백엔드 트레이트(crate::backend) 위에서 동작

pub mod frame;
pub mod ppm;
pub mod probe;
pub mod pump;
pub mod session;
pub mod sink;

pub use frame::{AudioChunk, DecodedFrame, RgbImage};
pub use probe::StreamDescriptor;
pub use pump::PumpResult;
pub use session::DecoderSession;
pub use sink::AudioPolicy;
