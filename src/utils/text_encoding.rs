// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

/// 从 Content-Type 头中提取 charset 参数
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches('"').as_bytes())
    })
}

/// 检测响应体的编码
///
/// 优先级：BOM > Content-Type charset > 合法UTF-8 > chardetng 猜测
pub fn detect_encoding(input: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(input) {
        return encoding;
    }

    if let Some(encoding) = content_type.and_then(charset_from_content_type) {
        return encoding;
    }

    if std::str::from_utf8(input).is_ok() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(input, true);
    let encoding = detector.guess(None, true);
    debug!("检测到编码: {}", encoding.name());
    encoding
}

/// 将响应体解码为UTF-8字符串
///
/// 非法字节序列以替换字符代替，永不失败。
pub fn decode_body(input: &[u8], content_type: Option<&str>) -> String {
    if input.is_empty() {
        return String::new();
    }
    let encoding = detect_encoding(input, content_type);
    let (decoded, _, had_errors) = encoding.decode(input);
    if had_errors {
        debug!("解码 {} 时存在非法字节", encoding.name());
    }
    decoded.into_owned()
}
