// 该文件是 Dongfeng （东风） 项目的一部分。
// src/input/read_image_file.rs - 读取图像文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageReader};
use tracing::{error, info};

use crate::input::InputError;

/// 从文件读取的单张图像
#[derive(Debug, Clone)]
pub struct ImageFileInput {
  path: PathBuf,
  image: DynamicImage,
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref().to_path_buf();
    let io_error = |source| {
      error!("读取图像文件失败: {}", path.display());
      InputError::Io {
        path: path.clone(),
        source,
      }
    };

    let image = ImageReader::open(&path)
      .map_err(io_error)?
      .with_guessed_format()
      .map_err(io_error)?
      .decode()
      .map_err(|source| {
        error!("图像解码失败: {}", path.display());
        InputError::Decode {
          path: path.clone(),
          source,
        }
      })?;

    let (width, height) = image.dimensions();
    info!(
      "读取图像 {}: {}x{}, {:?}",
      path.display(),
      height,
      width,
      image.color()
    );

    Ok(ImageFileInput { path, image })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn image(&self) -> &DynamicImage {
    &self.image
  }

  pub fn into_image(self) -> DynamicImage {
    self.image
  }
}

impl IntoIterator for ImageFileInput {
  type Item = DynamicImage;
  type IntoIter = std::option::IntoIter<DynamicImage>;

  fn into_iter(self) -> Self::IntoIter {
    Some(self.image).into_iter()
  }
}
