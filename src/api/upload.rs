use axum::extract::Multipart;

use crate::analysis::{ChartImage, Timeframe};
use crate::error::{AppError, Result};

/// Fields of the analysis form: an `image` file part and an optional
/// `timeframe` text part.
#[derive(Debug, Default)]
pub struct AnalysisForm {
    pub image: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub timeframe: Timeframe,
}

impl AnalysisForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = AnalysisForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InputError(format!("Invalid form data: {}", e)))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("image") => {
                    form.content_type = field.content_type().map(str::to_string);
                    form.file_name = field.file_name().map(str::to_string);
                    form.image = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::InputError(format!("Upload interrupted: {}", e)))?
                        .to_vec();
                }
                Some("timeframe") => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::InputError(format!("Invalid timeframe field: {}", e)))?;
                    if !value.trim().is_empty() {
                        form.timeframe = value.parse()?;
                    }
                }
                other => tracing::debug!("Ignoring form field {:?}", other),
            }
        }

        Ok(form)
    }

    /// Validates and decodes the uploaded image.
    pub fn decode_image(&mut self) -> Result<ChartImage> {
        let bytes = std::mem::take(&mut self.image);
        ChartImage::decode(bytes, self.content_type.as_deref())
    }
}
