use hand_landmarks::{HandLandmarks, HAND_CONNECTIONS};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use thiserror::Error;

const BONE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
}

pub struct AnnotatedImage {
    pub image: RgbImage,
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, AnnotateError> {
    Ok(image::load_from_memory(bytes)?)
}

impl AnnotatedImage {
    /// Copies `image` and draws the hand skeleton on top of it.
    pub fn new(image: &DynamicImage, landmarks: &HandLandmarks) -> Self {
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();
        let shortest = width.min(height) as f32;
        let thickness = (shortest / 250.0).round().max(1.0) as i32;
        let radius = (shortest / 100.0).round().max(2.0) as i32;

        let to_pixels = |index: usize| {
            let point = landmarks[index];
            (point.x * width as f32, point.y * height as f32)
        };

        for (from, to) in HAND_CONNECTIONS {
            let (start, end) = (to_pixels(from), to_pixels(to));
            for offset in -(thickness / 2)..=(thickness - 1) / 2 {
                let shift = offset as f32;
                draw_line_segment_mut(
                    &mut canvas,
                    (start.0 + shift, start.1),
                    (end.0 + shift, end.1),
                    BONE_COLOR,
                );
                draw_line_segment_mut(
                    &mut canvas,
                    (start.0, start.1 + shift),
                    (end.0, end.1 + shift),
                    BONE_COLOR,
                );
            }
        }
        for index in 0..landmarks.points().len() {
            let (x, y) = to_pixels(index);
            draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), radius, JOINT_COLOR);
        }

        Self { image: canvas }
    }

    pub fn to_jpg(&self) -> Result<Vec<u8>, AnnotateError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .encode_image(&self.image)
            .map_err(AnnotateError::Encode)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::open_hand;
    use image::ImageBuffer;
    use std::io::Cursor;

    fn grey_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([40, 40, 40])))
    }

    #[test]
    fn test_annotation_marks_landmarks() {
        let image = grey_image(200, 200);
        let hand = open_hand();

        let annotated = AnnotatedImage::new(&image, &hand);

        let wrist = hand[0];
        let x = (wrist.x * 200.0) as u32;
        let y = (wrist.y * 200.0) as u32;
        assert_eq!(annotated.image.get_pixel(x, y), &JOINT_COLOR);
        assert_eq!(annotated.image.get_pixel(0, 0), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_annotation_draws_bones_between_joints() {
        let image = grey_image(200, 200);
        let hand = open_hand();

        let annotated = AnnotatedImage::new(&image, &hand);

        // midpoint of the middle finger bone from PIP (10) to DIP (11)
        let (pip, dip) = (hand[10], hand[11]);
        let x = ((pip.x + dip.x) / 2.0 * 200.0).round() as u32;
        let y = ((pip.y + dip.y) / 2.0 * 200.0).round() as u32;
        assert_eq!(annotated.image.get_pixel(x, y), &BONE_COLOR);
    }

    #[test]
    fn test_out_of_frame_landmarks_do_not_panic() {
        let image = grey_image(50, 30);
        let points = open_hand()
            .points()
            .iter()
            .map(|p| hand_landmarks::Landmark::new(p.x * 3.0 - 1.0, p.y * 3.0 - 1.0, 0.0))
            .collect();
        let hand = HandLandmarks::new(points).unwrap();

        let annotated = AnnotatedImage::new(&image, &hand);
        assert_eq!(annotated.image.dimensions(), (50, 30));
    }

    #[test]
    fn test_to_jpg_produces_decodable_image() {
        let annotated = AnnotatedImage::new(&grey_image(64, 48), &open_hand());
        let jpg = annotated.to_jpg().unwrap();

        let decoded = image::ImageReader::new(Cursor::new(jpg))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(AnnotateError::Decode(_))
        ));
    }
}
