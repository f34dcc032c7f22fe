//! QR codes pointing phones at the browser form.
//!
//! The payload is either the fixed public form URL from the config or the
//! address of the locally running form server.

use crate::error::{AppError, Result};
use crate::render::FILE_TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use image::Luma;
use log::info;
use qrcode::QrCode;
use qrcode::render::unicode;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::{Path, PathBuf};

fn encode(data: &str) -> Result<QrCode> {
    QrCode::new(data.as_bytes()).map_err(|e| AppError::Qr(e.to_string()))
}

/// Writes `qr_code_<timestamp>.png` into `dir` and returns its path.
pub fn save_qr_png(data: &str, dir: &Path, generated_at: NaiveDateTime) -> Result<PathBuf> {
    let code = encode(data)?;
    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(10, 10)
        .build();

    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "qr_code_{}.png",
        generated_at.format(FILE_TIMESTAMP_FORMAT)
    ));
    image.save(&path)?;
    info!("QR code for {} saved to {}", data, path.display());
    Ok(path)
}

/// Draws the code with half-block characters for display in a terminal.
pub fn render_terminal(data: &str) -> Result<String> {
    let code = encode(data)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// URL of the form server. Wildcard binds are replaced by the address other
/// machines on the LAN would use to reach this one.
pub fn local_url(host: &str, port: u16) -> String {
    let host = match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => lan_address().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        Ok(ip) => ip,
        Err(_) => return format!("http://{}:{}/", host, port),
    };
    match host {
        IpAddr::V4(v4) => format!("http://{}:{}/", v4, port),
        IpAddr::V6(v6) => format!("http://[{}]:{}/", v6, port),
    }
}

// Connecting a UDP socket sends nothing; it only selects the outbound interface.
fn lan_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
