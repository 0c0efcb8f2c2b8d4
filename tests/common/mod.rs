#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use chart_insight::error::{AppError, Result};
use chart_insight::llm::{MultimodalPrompt, VisionModel};
use chart_insight::news::FeedFetcher;

pub const BOUNDARY: &str = "chart-insight-test-boundary";

/// Records every prompt and answers with a fixed reply.
pub struct FakeModel {
    reply: std::result::Result<String, String>,
    pub prompts: Mutex<Vec<(String, String, usize)>>,
}

impl FakeModel {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake-vision"
    }

    async fn generate(&self, prompt: &MultimodalPrompt<'_>) -> Result<String> {
        self.prompts.lock().unwrap().push((
            prompt.user_text.to_string(),
            prompt.image.mime_type.to_string(),
            prompt.image.data.len(),
        ));
        self.reply.clone().map_err(AppError::LlmError)
    }
}

/// Serves a fixed body for every URL and remembers which URLs were asked for.
pub struct FakeFetcher {
    body: std::result::Result<String, String>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(body: String) -> Arc<Self> {
        Arc::new(Self {
            body: Ok(body),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Err(message.to_string()),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.urls.lock().unwrap().push(url.to_string());
        self.body
            .clone()
            .map(String::into_bytes)
            .map_err(AppError::FetchError)
    }
}

/// RSS 2.0 document with `count` items, newest first.
pub fn rss_with_items(count: usize) -> String {
    let mut items = String::new();
    for i in 1..=count {
        items.push_str(&format!(
            "<item>\
               <title>Headline {i}</title>\
               <link>https://news.example.com/{i}</link>\
               <pubDate>Mon, 13 Oct 2025 {hour:02}:00:00 GMT</pubDate>\
               <description><![CDATA[<p>Summary <b>{i}</b></p>]]></description>\
             </item>",
            hour = 23 - (i % 24),
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test</title><link>https://news.example.com</link><description>Test</description>{}</channel></rss>"#,
        items
    )
}

pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(6, 4, image::Rgb([20, 40, 60]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// Builds a multipart/form-data body for the analysis form.
pub fn analysis_form(image: Option<(&str, &[u8])>, timeframe: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some((content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"chart\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(timeframe) = timeframe {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"timeframe\"\r\n\r\n{timeframe}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Runs `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
