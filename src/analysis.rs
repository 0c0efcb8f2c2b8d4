//! Chart analysis: timeframe choices, the fixed analyst instruction, upload
//! validation and the single model call.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GenericImageView, ImageFormat};
use pulldown_cmark::{html, Options, Parser};
use serde::{Serialize, Serializer};

use crate::error::{AppError, Result};
use crate::llm::{InlineImage, MultimodalPrompt, VisionModel};

pub const SYSTEM_INSTRUCTION: &str = "Anda adalah seorang analis teknikal trading AI yang ahli.
Tugas utama Anda adalah menganalisis gambar screenshot chart trading yang diberikan dan secara proaktif mengidentifikasi pola indikator untuk memprediksi sinyal bullish atau bearish.
Pengguna akan memberikan konteks timeframe (misal: '1 Menit', '1 Jam', '1 Hari'). Gunakan informasi timeframe ini untuk menyempurnakan analisis Anda. Timeframe yang lebih pendek (scalping) memiliki implikasi yang berbeda dari timeframe harian (swing).

Fokus pada:
1.  **Analisis Indikator:** Cari sinyal di RSI (overbought, oversold, divergence), MACD (crossover, divergence), Moving Averages (golden cross, death cross), Bollinger Bands (squeeze, breakout).
2.  **Analisis Pola Candlestick:** Identifikasi pola reversal atau continuation (doji, hammer, engulfing).
3.  **Analisis Pola Chart:** Cari pola yang lebih besar (double top/bottom, head and shoulders, triangles, wedges).
4.  **Volume:** Analisis volume untuk mengkonfirmasi kekuatan sinyal.

**PENTING:** Jika ada pola chart yang jelas atau level support/resistance yang terlihat, coba identifikasi potensi target pergerakan harga atau level penting dalam analisis Anda. Namun, **TEGASKAN BAHWA INI SANGAT SPEKULATIF DAN HANYA BERDASARKAN VISUAL, BUKAN DATA REAL-TIME.** AI tidak memiliki akses ke data harga langsung atau fundamental pasar.

Setelah menganalisis semua ini, berikan kesimpulan prediksi: **BULLISH**, **BEARISH**, atau **NETRAL/SIDEWAYS**.
Jelaskan alasan Anda secara ringkas dan jelas berdasarkan apa yang Anda lihat di gambar.

Selalu akhiri dengan peringatan bahwa ini bukan nasihat keuangan (DYOR).
Jawab dalam Bahasa Indonesia.
";

pub const DISCLAIMER: &str = "**Peringatan Penting:** Prediksi target harga atau pergerakan spesifik oleh AI hanya berdasarkan \
analisis visual gambar statis dan sangat spekulatif. JANGAN gunakan ini sebagai dasar keputusan \
trading Anda. AI TIDAK memiliki akses ke data harga real-time atau informasi pasar terkini.\n\n\
*Ini adalah analisis AI dan bukan nasihat keuangan. Selalu lakukan riset Anda sendiri (DYOR).*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    #[default]
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
    Other,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1 Menit",
            Timeframe::FiveMinutes => "5 Menit",
            Timeframe::FifteenMinutes => "15 Menit",
            Timeframe::ThirtyMinutes => "30 Menit",
            Timeframe::OneHour => "1 Jam",
            Timeframe::FourHours => "4 Jam",
            Timeframe::OneDay => "1 Hari",
            Timeframe::OneWeek => "1 Minggu",
            Timeframe::Other => "Lainnya / Tidak Tahu",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
            Timeframe::Other => "other",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(s) || tf.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::InputError(format!("Timeframe tidak dikenal: '{}'", s)))
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

pub fn user_prompt(timeframe: Timeframe) -> String {
    format!(
        "Lakukan analisis prediktif (bullish/bearish) pada gambar chart ini. Konteks timeframe adalah: {}.",
        timeframe.label()
    )
}

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    Jpeg,
    Png,
}

impl ChartFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ChartFormat::Jpeg => "image/jpeg",
            ChartFormat::Png => "image/png",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ChartFormat::Jpeg),
            "image/png" => Some(ChartFormat::Png),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ChartFormat::Jpeg => ImageFormat::Jpeg,
            ChartFormat::Png => ImageFormat::Png,
        }
    }
}

/// An uploaded chart screenshot that is known to decode.
#[derive(Debug, Clone)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub format: ChartFormat,
    pub width: u32,
    pub height: u32,
}

impl ChartImage {
    /// Validates the upload. The format is sniffed from the bytes; the
    /// declared content type is only consulted when sniffing fails.
    pub fn decode(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AppError::InputError(
                "Silakan unggah gambar untuk memulai analisis.".to_string(),
            ));
        }

        let format = match image::guess_format(&bytes) {
            Ok(ImageFormat::Jpeg) => ChartFormat::Jpeg,
            Ok(ImageFormat::Png) => ChartFormat::Png,
            Ok(other) => {
                return Err(AppError::InputError(format!(
                    "Format gambar {:?} tidak didukung, gunakan JPG atau PNG.",
                    other
                )));
            }
            Err(_) => match declared_mime.and_then(ChartFormat::from_mime) {
                Some(format) => format,
                None => {
                    return Err(AppError::InputError(format!(
                        "Tipe file '{}' tidak didukung, gunakan JPG atau PNG.",
                        declared_mime.unwrap_or("unknown")
                    )));
                }
            },
        };

        let decoded = image::load_from_memory_with_format(&bytes, format.image_format())
            .map_err(|e| AppError::ImageError(e.to_string()))?;

        let (width, height) = decoded.dimensions();

        Ok(ChartImage {
            width,
            height,
            bytes,
            format,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `data:` URI used for the preview on the result page.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartAnalysis {
    pub timeframe: Timeframe,
    pub model: String,
    pub markdown: String,
    pub html: String,
    pub disclaimer: &'static str,
    pub disclaimer_html: String,
}

/// The model's answer is trusted Markdown.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, parser);
    out
}

pub async fn analyze_chart(
    model: &dyn VisionModel,
    image: &ChartImage,
    timeframe: Timeframe,
) -> Result<ChartAnalysis> {
    let user_text = user_prompt(timeframe);
    let prompt = MultimodalPrompt {
        system_instruction: SYSTEM_INSTRUCTION,
        user_text: &user_text,
        image: InlineImage {
            mime_type: image.mime_type(),
            data: &image.bytes,
        },
    };

    tracing::info!(
        model = model.model_name(),
        timeframe = timeframe.label(),
        mime = image.mime_type(),
        width = image.width,
        height = image.height,
        "Requesting chart analysis"
    );
    let started = std::time::Instant::now();

    let markdown = model.generate(&prompt).await?;
    tracing::info!("Chart analysis returned {} chars in {:?}", markdown.len(), started.elapsed());

    Ok(ChartAnalysis {
        timeframe,
        model: model.model_name().to_string(),
        html: markdown_to_html(&markdown),
        markdown,
        disclaimer: DISCLAIMER,
        disclaimer_html: markdown_to_html(DISCLAIMER),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    use async_trait::async_trait;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 200, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    struct RecordingModel {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<(String, String, String, usize)>>,
    }

    #[async_trait]
    impl VisionModel for RecordingModel {
        fn model_name(&self) -> &str {
            "fake-vision"
        }

        async fn generate(&self, prompt: &MultimodalPrompt<'_>) -> Result<String> {
            self.seen.lock().unwrap().push((
                prompt.system_instruction.to_string(),
                prompt.user_text.to_string(),
                prompt.image.mime_type.to_string(),
                prompt.image.data.len(),
            ));
            self.reply.clone().map_err(AppError::LlmError)
        }
    }

    #[test]
    fn nine_timeframes_with_one_hour_default() {
        assert_eq!(Timeframe::ALL.len(), 9);
        assert_eq!(Timeframe::default(), Timeframe::OneHour);
        assert_eq!(Timeframe::default().label(), "1 Jam");
        assert_eq!(Timeframe::ALL[4], Timeframe::default());
    }

    #[test]
    fn timeframe_parses_label_and_slug() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.label().parse::<Timeframe>().unwrap(), tf);
            assert_eq!(tf.slug().parse::<Timeframe>().unwrap(), tf);
        }
        assert!(matches!("2 Jam".parse::<Timeframe>(), Err(AppError::InputError(_))));
    }

    #[test]
    fn user_prompt_names_the_timeframe() {
        assert_eq!(
            user_prompt(Timeframe::FourHours),
            "Lakukan analisis prediktif (bullish/bearish) pada gambar chart ini. Konteks timeframe adalah: 4 Jam."
        );
    }

    #[test]
    fn system_instruction_is_complete() {
        assert!(SYSTEM_INSTRUCTION.contains("NETRAL/SIDEWAYS"));
        assert!(SYSTEM_INSTRUCTION.contains("Jawab dalam Bahasa Indonesia."));
        assert!(!SYSTEM_INSTRUCTION.contains("sisa system prompt"));
    }

    #[test]
    fn decodes_png_and_jpeg() {
        let png = ChartImage::decode(png_bytes(), Some("image/png")).unwrap();
        assert_eq!((png.width, png.height), (4, 3));
        assert_eq!(png.mime_type(), "image/png");

        let jpeg = ChartImage::decode(jpeg_bytes(), None).unwrap();
        assert_eq!(jpeg.format, ChartFormat::Jpeg);
        assert!(jpeg.data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn content_is_sniffed_before_the_declared_type() {
        let image = ChartImage::decode(png_bytes(), Some("image/jpeg")).unwrap();
        assert_eq!(image.format, ChartFormat::Png);
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!((image.width, image.height), (4, 3));

        let image = ChartImage::decode(jpeg_bytes(), Some("application/octet-stream")).unwrap();
        assert_eq!(image.format, ChartFormat::Jpeg);
    }

    #[test]
    fn undecodable_image_is_an_image_error() {
        let err = ChartImage::decode(b"not really a png".to_vec(), Some("image/png")).unwrap_err();
        assert!(matches!(err, AppError::ImageError(_)));
    }

    #[test]
    fn unsupported_or_empty_upload_is_an_input_error() {
        assert!(matches!(
            ChartImage::decode(b"GIF89a....".to_vec(), Some("image/gif")),
            Err(AppError::InputError(_))
        ));
        assert!(matches!(
            ChartImage::decode(Vec::new(), Some("image/png")),
            Err(AppError::InputError(_))
        ));
    }

    #[tokio::test]
    async fn every_timeframe_produces_a_rendered_result() {
        let model = RecordingModel {
            reply: Ok("Kesimpulan: **BULLISH**".into()),
            seen: Mutex::new(Vec::new()),
        };
        let image = ChartImage::decode(png_bytes(), Some("image/png")).unwrap();

        for tf in Timeframe::ALL {
            let analysis = analyze_chart(&model, &image, tf).await.unwrap();
            assert_eq!(analysis.timeframe, tf);
            assert!(analysis.html.contains("<strong>BULLISH</strong>"));
            assert!(analysis.disclaimer_html.contains("Peringatan Penting"));
        }

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[0].0, SYSTEM_INSTRUCTION);
        assert!(seen[0].1.ends_with("1 Menit."));
        assert_eq!(seen[0].2, "image/png");
        assert_eq!(seen[0].3, image.bytes.len());
    }

    #[tokio::test]
    async fn remote_failure_yields_no_partial_result() {
        let model = RecordingModel {
            reply: Err("quota exceeded".into()),
            seen: Mutex::new(Vec::new()),
        };
        let image = ChartImage::decode(png_bytes(), Some("image/png")).unwrap();

        let err = analyze_chart(&model, &image, Timeframe::OneDay).await.unwrap_err();
        assert!(matches!(err, AppError::LlmError(msg) if msg == "quota exceeded"));
    }
}
