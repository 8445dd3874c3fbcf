//! XML bodies of the multi-object delete call and S3 error responses

use super::types::DeleteError;
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io;

/// Errors while writing or reading S3 XML
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("missing required XML element: {0}")]
    MissingElement(String),

    #[error("unexpected XML content: {0}")]
    Unexpected(String),
}

/// Body of a `POST ?delete` request
///
/// With `quiet` set, the service only reports the entries it failed to delete.
pub fn delete_request_body(
    entries: &[(&str, Option<&str>)],
    quiet: bool,
) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(64 + entries.len() * 64);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.create_element("Delete").write_inner_content(|w| {
        if quiet {
            w.create_element("Quiet")
                .write_text_content(BytesText::new("true"))?;
        }
        for (key, version_id) in entries {
            w.create_element("Object").write_inner_content(|w| {
                w.create_element("Key")
                    .write_text_content(BytesText::new(key))?;
                if let Some(version_id) = version_id {
                    w.create_element("VersionId")
                        .write_text_content(BytesText::new(version_id))?;
                }
                Ok(())
            })?;
        }
        Ok(())
    })?;

    Ok(buf)
}

/// Read the per-object failures from a `DeleteResult` body, in document order
///
/// `<Deleted>` entries are skipped; an empty body means nothing failed.
pub fn parse_delete_result(xml: &[u8]) -> Result<Vec<DeleteError>, XmlError> {
    if xml.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_reader(xml);

    let mut errors = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match name.as_ref() {
                    b"DeleteResult" if !seen_root => seen_root = true,
                    b"Error" if seen_root => errors.push(read_delete_error(&mut reader)?),
                    _ if seen_root => skip_element(&mut reader)?,
                    other => {
                        return Err(XmlError::Unexpected(format!(
                            "expected DeleteResult, found {}",
                            String::from_utf8_lossy(other)
                        )))
                    }
                }
            }
            Event::Empty(e) if !seen_root && e.name().as_ref() == b"DeleteResult" => {
                return Ok(errors)
            }
            Event::End(_) => break,
            Event::Eof => {
                if !seen_root {
                    return Err(XmlError::MissingElement("DeleteResult".to_string()));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(errors)
}

fn read_delete_error(reader: &mut Reader<&[u8]>) -> Result<DeleteError, XmlError> {
    let mut key = None;
    let mut version_id = None;
    let mut code = String::new();
    let mut message = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                b"VersionId" => version_id = Some(read_text_content(reader)?),
                b"Code" => code = read_text_content(reader)?,
                b"Message" => message = read_text_content(reader)?,
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::Unexpected("EOF inside Error".to_string()));
            }
            _ => {}
        }
    }

    Ok(DeleteError {
        key: key.ok_or_else(|| XmlError::MissingElement("Error/Key".to_string()))?,
        version_id: version_id.filter(|v| !v.is_empty()),
        code,
        message,
    })
}

/// Extract `(Code, Message)` from an S3 `<Error>` body
pub fn parse_error_body(xml: &[u8]) -> Option<(String, String)> {
    let mut reader = Reader::from_reader(xml);

    let mut code = None;
    let mut message = String::new();
    let mut in_error = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Error" => in_error = true,
                b"Code" if in_error => code = Some(read_text_content(&mut reader).ok()?),
                b"Message" if in_error => message = read_text_content(&mut reader).ok()?,
                _ => skip_element(&mut reader).ok()?,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    code.map(|code| (code, message))
}

/// Read the text of the current element and consume its end tag
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::Unexpected(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::Unexpected(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(&e).into_owned();
                text.push_str(&resolve_reference(&name)?);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "EOF while reading text content".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Resolve `&name;` reported separately from the surrounding text
fn resolve_reference(name: &str) -> Result<String, XmlError> {
    if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return Ok(resolved.to_string());
    }

    let code = if let Some(hex) = name.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };

    code.and_then(char::from_u32)
        .map(String::from)
        .ok_or_else(|| XmlError::Unexpected(format!("unknown entity &{};", name)))
}

/// Skip an element and all of its children
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "EOF while skipping element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_request_body() {
        let body = delete_request_body(&[("a.txt", None), ("b&c.txt", Some("v2"))], true).unwrap();
        let xml = std::str::from_utf8(&body).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Delete><Quiet>true</Quiet>"));
        assert!(xml.contains("<Object><Key>a.txt</Key></Object>"));
        assert!(xml.contains("<Object><Key>b&amp;c.txt</Key><VersionId>v2</VersionId></Object>"));
        assert!(xml.ends_with("</Delete>"));
    }

    #[test]
    fn test_parse_delete_result_in_order() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Deleted><Key>ok.txt</Key></Deleted>
  <Error><Key>first.txt</Key><Code>AccessDenied</Code><Message>Access Denied</Message></Error>
  <Error><Key>second &amp; third.txt</Key><VersionId>v9</VersionId><Code>InternalError</Code><Message>We encountered an internal error</Message></Error>
</DeleteResult>"#;

        let errors = parse_delete_result(xml).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].key, "first.txt");
        assert_eq!(errors[0].code, "AccessDenied");
        assert_eq!(errors[0].version_id, None);
        assert_eq!(errors[1].key, "second & third.txt");
        assert_eq!(errors[1].version_id.as_deref(), Some("v9"));
        assert_eq!(errors[1].message, "We encountered an internal error");
    }

    #[test]
    fn test_parse_empty_delete_result() {
        assert!(parse_delete_result(b"").unwrap().is_empty());
        assert!(parse_delete_result(b"<DeleteResult/>").unwrap().is_empty());
        assert!(parse_delete_result(b"<DeleteResult></DeleteResult>")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_delete_result_rejects_other_roots() {
        assert!(parse_delete_result(b"<Error><Code>NoSuchBucket</Code></Error>").is_err());
    }

    #[test]
    fn test_parse_error_body() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Resource>/b/k</Resource></Error>"#;
        assert_eq!(
            parse_error_body(xml),
            Some((
                "NoSuchKey".to_string(),
                "The specified key does not exist.".to_string()
            ))
        );
        assert_eq!(parse_error_body(b"not xml at all"), None);
        assert_eq!(parse_error_body(b""), None);
    }
}
