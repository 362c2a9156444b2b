use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// One complete JPEG image per frame
    Mjpeg,
    /// Packed YUV 4:2:2, luma on even bytes
    Yuyv,
    Rgb24,
    Gray8,
}

impl FrameFormat {
    /// Payload size for a `width` x `height` frame; `None` for JPEG
    pub fn payload_len(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            FrameFormat::Mjpeg => None,
            FrameFormat::Yuyv => Some(pixels * 2),
            FrameFormat::Rgb24 => Some(pixels * 3),
            FrameFormat::Gray8 => Some(pixels),
        }
    }
}

/// A captured image. Immutable once produced; clones share the payload.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Position in capture order
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Same frame metadata with a replacement payload
    pub fn with_data(&self, data: Arc<Vec<u8>>) -> Self {
        Self {
            data,
            ..self.clone()
        }
    }

    pub fn expected_size(&self) -> Option<usize> {
        self.format.payload_len(self.width, self.height)
    }

    /// Uncompressed payloads must match their dimensions exactly
    pub fn validate_size(&self) -> bool {
        self.expected_size()
            .map_or(true, |expected| self.data.len() == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_len_per_format() {
        assert_eq!(FrameFormat::Mjpeg.payload_len(640, 480), None);
        assert_eq!(FrameFormat::Yuyv.payload_len(640, 480), Some(640 * 480 * 2));
        assert_eq!(FrameFormat::Rgb24.payload_len(4, 2), Some(24));
        assert_eq!(FrameFormat::Gray8.payload_len(4, 2), Some(8));
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480 * 2],
            640,
            480,
            FrameFormat::Yuyv,
        );
        assert!(valid.validate_size());

        let short = FrameData::new(2, SystemTime::now(), vec![0u8; 100], 640, 480, FrameFormat::Yuyv);
        assert!(!short.validate_size());

        let mjpeg = FrameData::new(3, SystemTime::now(), vec![0u8; 5000], 640, 480, FrameFormat::Mjpeg);
        assert!(mjpeg.validate_size());
    }

    #[test]
    fn test_clone_shares_payload() {
        let frame = FrameData::new(7, SystemTime::now(), vec![1u8; 64], 8, 8, FrameFormat::Gray8);
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &copy.data));

        let replaced = frame.with_data(Arc::new(vec![2u8; 64]));
        assert_eq!(replaced.id, 7);
        assert_eq!(replaced.data[0], 2);
        assert_eq!(frame.data[0], 1);
    }
}
