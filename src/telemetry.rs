//! emoncms input API request building

use core::fmt::{self, Write};

use heapless::String;
use rand_core::{CryptoRng, RngCore};

use crate::config::{EMONCMS_NODE, EMONCMS_URL, EMONCMS_WRITE_KEY};
use crate::http::{HttpClient, HttpError, Response, Url};
use crate::logic::Payload;

pub const TARGET_CAPACITY: usize = 512;

/// Append `value` percent-encoded. Only RFC 3986 unreserved characters pass
/// through unchanged.
pub fn percent_encode<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.write_char(byte as char)?
            }
            _ => write!(out, "%{:02X}", byte)?,
        }
    }
    Ok(())
}

/// Build `<path>?node=..&fulljson=..&apikey=..`
pub fn request_target(
    path: &str,
    node: &str,
    json: &str,
    api_key: &str,
) -> Result<String<TARGET_CAPACITY>, fmt::Error> {
    let mut target = String::new();
    target.push_str(path).map_err(|_| fmt::Error)?;
    target.push_str("?node=").map_err(|_| fmt::Error)?;
    percent_encode(&mut target, node)?;
    target.push_str("&fulljson=").map_err(|_| fmt::Error)?;
    percent_encode(&mut target, json)?;
    target.push_str("&apikey=").map_err(|_| fmt::Error)?;
    percent_encode(&mut target, api_key)?;
    Ok(target)
}

/// Request target for posting `payload` to the configured node
pub fn post_target(path: &str, payload: &Payload) -> Result<String<TARGET_CAPACITY>, fmt::Error> {
    let json = payload.to_json()?;
    request_target(path, EMONCMS_NODE, &json, EMONCMS_WRITE_KEY)
}

/// Send `payload` to the configured emoncms endpoint
pub async fn post<R>(client: &mut HttpClient<'_, R>, payload: &Payload) -> Result<Response, HttpError>
where
    R: RngCore + CryptoRng,
{
    let endpoint = Url::parse(EMONCMS_URL).ok_or(HttpError::InvalidUrl)?;
    let target = post_target(endpoint.target, payload).map_err(|_| HttpError::RequestTooLong)?;
    let url = Url {
        target: &target,
        ..endpoint
    };
    esp_println::println!("[HTTP] GET {}", url);
    client.get(url).await
}
