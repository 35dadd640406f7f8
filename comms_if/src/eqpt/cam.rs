//! # Camera Equipment Communications Module
//!
//! The robot carries two cameras looking along the crop row, one at the front and one at the
//! back. Frames travel over the network as encoded [`CamFrame`]s and are decoded into
//! [`CamImage`]s before being handed to navigation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};
use std::{collections::HashMap, fmt::Display};
use chrono::{DateTime, Utc, serde::ts_milliseconds};
use image::{DynamicImage, GenericImageView, ImageResult};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Request to be sent by the camera client to the server
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamRequest {
    /// List of cameras to acquire a frame from
    pub cameras: Vec<CamId>,

    /// Format of the images to acquire
    pub format: ImageFormat
}

/// Response to be sent by the server to the client
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamResponse {
    /// Frames acquired in response to the request
    pub frames: HashMap<CamId, CamFrame>
}

/// An individual frame from a camera
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamFrame {

    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The format of this frame
    pub format: ImageFormat,

    /// The formatted image data
    pub data: Vec<u8>
}

/// A decoded camera image.
#[derive(Clone, Debug)]
pub struct CamImage {
    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: DynamicImage
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Cameras available on the robot
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, Eq, PartialEq)]
pub enum CamId {
    /// The camera looking out of the front of the robot
    Front,

    /// The camera looking out of the back of the robot
    Back,
}

/// Possible formats for camera images. This is used rather than image::ImageFormat to:
///     1. Restrict the formats that can be sent back and forth
///     2. Allow serialisation as image::ImageFormat does not implement serde.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
pub enum ImageFormat {
    /// PNG image
    Png,

    /// JPEG image with a quality value between 1 and 100, where 100 is best.
    Jpeg(u8)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamId {
    /// The camera on the opposite end of the robot.
    pub fn other(&self) -> Self {
        match self {
            CamId::Front => CamId::Back,
            CamId::Back => CamId::Front
        }
    }

    /// Returns the camera corresponding to the given front flag.
    pub fn from_front_flag(is_front: bool) -> Self {
        if is_front {
            CamId::Front
        }
        else {
            CamId::Back
        }
    }
}

impl Display for CamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CamId::Front => write!(f, "front"),
            CamId::Back => write!(f, "back"),
        }
    }
}

impl CamFrame {
    /// Convert this camera frame into a camera image
    pub fn to_cam_image(&self) -> image::ImageResult<CamImage>  {
        let format = match self.format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg(_) => image::ImageFormat::Jpeg
        };

        Ok(CamImage {
            timestamp: self.timestamp,
            image: image::load_from_memory_with_format(&self.data, format)?
        })
    }
}

impl CamImage {
    /// Create a new image stamped with the current time.
    pub fn now(image: DynamicImage) -> Self {
        Self {
            timestamp: Utc::now(),
            image
        }
    }

    /// Width of the image in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the image in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Convert this camera image into a camera frame with the given format
    pub fn to_cam_frame(&self, format: ImageFormat) -> ImageResult<CamFrame> {
        let mut data = Vec::<u8>::new();

        let output_format = match format {
            ImageFormat::Png => image::ImageOutputFormat::Png,
            ImageFormat::Jpeg(q)  => image::ImageOutputFormat::Jpeg(q)
        };

        self.image.write_to(&mut data, output_format)?;

        Ok(CamFrame {
            timestamp: self.timestamp,
            format,
            data
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
