// PPM(P6) 덤프 - 디버그용 프레임 파일 출력
// 헤더: "P6\n<w> <h>\n255\n" + height행 x (width*3) 바이트

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::frame::RgbImage;

/// RGB24 이미지를 PPM으로 기록
/// 각 행은 row*stride 오프셋에서 width*3 바이트만 사용 (stride 패딩 제외)
pub fn write_ppm<W: Write>(writer: &mut W, image: &RgbImage) -> io::Result<()> {
    let row_len = image.row_len();
    let height = image.height as usize;

    if image.stride < row_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid stride: {} < {} (width * 3)", image.stride, row_len),
        ));
    }

    // 마지막 행은 stride 패딩이 없을 수 있음
    let required = if height == 0 {
        0
    } else {
        (height - 1) * image.stride + row_len
    };
    if image.data.len() < required {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Frame data too small: got {} bytes, need {} ({}x{}, stride={})",
                image.data.len(),
                required,
                image.width,
                image.height,
                image.stride
            ),
        ));
    }

    write!(writer, "P6\n{} {}\n255\n", image.width, image.height)?;
    for y in 0..height {
        writer.write_all(image.row(y))?;
    }
    Ok(())
}

pub fn save_ppm(path: &Path, image: &RgbImage) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ppm(&mut writer, image)?;
    writer.flush()
}
