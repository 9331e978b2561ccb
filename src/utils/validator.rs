use std::path::Path;
use url::Url;

/// 下载地址类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    Magnet,
    Http,
    MetainfoFile,
    Unknown,
}

pub fn classify(uri: &str) -> UriKind {
    let uri = uri.trim();
    if uri.starts_with("magnet:") {
        return UriKind::Magnet;
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return UriKind::Http;
    }
    if Path::new(uri)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("torrent"))
        .unwrap_or(false)
    {
        return UriKind::MetainfoFile;
    }
    UriKind::Unknown
}

/// 磁力链接中的 `dn` 参数
pub fn magnet_display_name(uri: &str) -> Option<String> {
    let url = Url::parse(uri.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "dn")
        .map(|(_, value)| value.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// 从URL路径中提取文件名
pub fn filename_from_url(uri: &str) -> Option<String> {
    let url = Url::parse(uri.trim()).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// 种子文件路径去掉扩展名后的文件名
pub fn metainfo_stem(uri: &str) -> Option<String> {
    Path::new(uri.trim())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
