//! End-to-end event stream tests.

use pullxml::{Config, ErrorKind, Event, NsReader, Reader, StreamReader};

/// Render an event compactly for sequence comparisons.
fn render(event: &Event<'_>) -> String {
    match event {
        Event::Start(e) => format!(
            "Start({},{})",
            e.name_str().unwrap(),
            render_attrs(&e.attributes)
        ),
        Event::Empty(e) => format!(
            "Empty({},{})",
            e.name_str().unwrap(),
            render_attrs(&e.attributes)
        ),
        Event::End(e) => format!("End({})", e.name_str().unwrap()),
        Event::Text(t) => format!("Text({:?})", t.as_str().unwrap()),
        Event::CData(c) => format!("CData({})", std::str::from_utf8(c).unwrap()),
        Event::Comment(c) => format!("Comment({})", std::str::from_utf8(c).unwrap()),
        Event::Pi { target, data } => format!(
            "PI({},{})",
            std::str::from_utf8(target).unwrap(),
            data.as_ref()
                .map(|d| std::str::from_utf8(d).unwrap())
                .unwrap_or("")
        ),
        Event::Decl(d) => format!(
            "Decl({},{:?},{:?})",
            std::str::from_utf8(&d.version).unwrap(),
            d.encoding
                .as_ref()
                .map(|e| std::str::from_utf8(e).unwrap()),
            d.standalone
        ),
        Event::DocType(d) => format!("DocType({})", std::str::from_utf8(d).unwrap()),
        Event::Eof => "Eof".to_string(),
    }
}

fn render_attrs(attrs: &[pullxml::Attr<'_>]) -> String {
    let parts: Vec<String> = attrs
        .iter()
        .map(|a| format!("{}={}", a.name_str().unwrap(), a.value_str().unwrap()))
        .collect();
    format!("[{}]", parts.join(","))
}

fn events(input: &str) -> Vec<String> {
    let mut reader = Reader::from_str(input);
    let mut out = Vec::new();
    loop {
        let event = reader.next_event().unwrap();
        let done = matches!(event, Event::Eof);
        out.push(render(&event));
        if done {
            return out;
        }
    }
}

fn first_error(input: &str) -> pullxml::Error {
    let mut reader = Reader::from_str(input);
    loop {
        match reader.next_event() {
            Ok(Event::Eof) => panic!("no error in {:?}", input),
            Ok(_) => {}
            Err(err) => return err,
        }
    }
}

#[test]
fn empty_root() {
    assert_eq!(events("<r/>"), vec!["Empty(r,[])", "Eof"]);
}

#[test]
fn nested_elements_with_text() {
    assert_eq!(
        events("<a><b>hi</b></a>"),
        vec![
            "Start(a,[])",
            "Start(b,[])",
            "Text(\"hi\")",
            "End(b)",
            "End(a)",
            "Eof"
        ]
    );
}

#[test]
fn references_in_text() {
    assert_eq!(
        events("<p>&lt;&#65;&#x42;</p>"),
        vec!["Start(p,[])", "Text(\"<AB\")", "End(p)", "Eof"]
    );
}

#[test]
fn duplicate_attribute_is_rejected() {
    let err = first_error("<x a=\"1\" a=\"2\"/>");
    match err.kind() {
        ErrorKind::DuplicateAttribute { name } => assert_eq!(&**name, "a"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn mismatched_end_is_rejected() {
    let err = first_error("<a></b>");
    match err.kind() {
        ErrorKind::MismatchedEnd { expected, found } => {
            assert_eq!(&**expected, "a");
            assert_eq!(&**found, "b");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn declaration_and_cdata() {
    assert_eq!(
        events("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r><![CDATA[<&>]]></r>"),
        vec![
            "Decl(1.0,Some(\"UTF-8\"),None)",
            "Text(\"\\n\")",
            "Start(r,[])",
            "CData(<&>)",
            "End(r)",
            "Eof"
        ]
    );
}

#[test]
fn doctype_entity_resolution() {
    assert_eq!(
        events("<!DOCTYPE r [<!ENTITY g \"X\">]><r>&g;</r>"),
        vec![
            "DocType(r [<!ENTITY g \"X\">])",
            "Start(r,[])",
            "Text(\"X\")",
            "End(r)",
            "Eof"
        ]
    );
}

#[test]
fn attribute_decoding_and_normalization() {
    assert_eq!(
        events("<x a=\"1 &amp; 2\" b=\"tab\there\"/>"),
        vec!["Empty(x,[a=1 & 2,b=tab here])", "Eof"]
    );
}

#[test]
fn entity_in_attribute_from_doctype() {
    assert_eq!(
        events("<!DOCTYPE r [<!ENTITY who \"world\">]><r greet=\"hello &who;\"/>"),
        vec![
            "DocType(r [<!ENTITY who \"world\">])",
            "Empty(r,[greet=hello world])",
            "Eof"
        ]
    );
}

#[test]
fn processing_instruction() {
    assert_eq!(
        events("<r><?php echo 1; ?></r>"),
        vec!["Start(r,[])", "PI(php,echo 1; )", "End(r)", "Eof"]
    );
}

#[test]
fn comments_pass_through_verbatim() {
    assert_eq!(
        events("<r><!-- a &amp; b --></r>"),
        vec!["Start(r,[])", "Comment( a &amp; b )", "End(r)", "Eof"]
    );
}

#[test]
fn unknown_entity_is_rejected_by_default() {
    let err = first_error("<r>&nope;</r>");
    assert!(matches!(err.kind(), ErrorKind::UnknownEntity { .. }));
}

#[test]
fn recursive_entity_is_rejected() {
    let err = first_error("<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>");
    assert!(matches!(err.kind(), ErrorKind::RecursiveEntity { .. }));
}

#[test]
fn entity_first_declaration_wins() {
    assert_eq!(
        events("<!DOCTYPE r [<!ENTITY e \"one\"><!ENTITY e \"two\">]><r>&e;</r>"),
        vec![
            "DocType(r [<!ENTITY e \"one\"><!ENTITY e \"two\">])",
            "Start(r,[])",
            "Text(\"one\")",
            "End(r)",
            "Eof"
        ]
    );
}

#[test]
fn lenient_lt_in_text() {
    assert_eq!(
        events("<r>1 < 2</r>"),
        vec![
            "Start(r,[])",
            "Text(\"1 \")",
            "Text(\"< 2\")",
            "End(r)",
            "Eof"
        ]
    );
}

#[test]
fn strict_mode_rejects_lenient_forms() {
    let mut reader = Reader::with_config(
        b"<r>1 < 2</r>",
        Config {
            strict: true,
            ..Config::default()
        },
    );
    reader.next_event().unwrap();
    reader.next_event().unwrap();
    assert!(reader.next_event().is_err());
}

#[test]
fn balanced_nesting_property() {
    let docs = [
        "<a><b><c/></b><d>t</d></a>",
        "<r>x<s>y</s>z</r>",
        "<?xml version=\"1.0\"?><root><!--c--><leaf/></root>",
    ];
    for doc in docs {
        let mut reader = Reader::from_str(doc);
        let mut starts = 0usize;
        let mut ends = 0usize;
        let mut stack = Vec::new();
        loop {
            match reader.next_event().unwrap() {
                Event::Start(e) => {
                    starts += 1;
                    stack.push(e.name.into_owned());
                }
                Event::End(e) => {
                    ends += 1;
                    assert_eq!(stack.pop().unwrap(), e.name.into_owned());
                }
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(starts, ends, "in {:?}", doc);
        assert!(stack.is_empty());
    }
}

#[test]
fn offset_monotonicity_property() {
    let doc = "<?xml version=\"1.0\"?><a n=\"1\"><b>text &amp; more</b><!--c--><c/></a>";
    let mut reader = Reader::from_str(doc);
    let mut last = reader.position().offset;
    loop {
        match reader.next_event().unwrap() {
            Event::Eof => break,
            _ => {
                let now = reader.position().offset;
                assert!(now > last, "position did not advance: {} -> {}", last, now);
                last = now;
            }
        }
    }
}

#[test]
fn deterministic_event_streams() {
    let doc = "<!DOCTYPE r [<!ENTITY e \"v\">]><r a=\"&e;\">text<![CDATA[raw]]></r>";
    assert_eq!(events(doc), events(doc));
}

#[test]
fn eof_idempotence() {
    let mut reader = Reader::from_str("<r/>");
    reader.next_event().unwrap();
    for _ in 0..4 {
        assert!(matches!(reader.next_event().unwrap(), Event::Eof));
    }
}

#[test]
fn error_poisons_reader() {
    let mut reader = Reader::from_str("<a><b></c></b></a>");
    reader.next_event().unwrap();
    reader.next_event().unwrap();
    let first = reader.next_event().unwrap_err();
    let second = reader.next_event().unwrap_err();
    assert_eq!(first.offset(), second.offset());
    assert_eq!(first.to_string(), second.to_string());
}

/// Serialize an event stream back to markup and reparse it; the two
/// streams must match for documents without DTD or CDATA.
#[test]
fn restricted_round_trip() {
    fn escape_text(s: &str) -> String {
        s.replace('&', "&amp;").replace('<', "&lt;")
    }
    fn escape_attr(s: &str) -> String {
        escape_text(s).replace('"', "&quot;")
    }

    let doc = "<a x=\"1 &amp; 2\"><b>three &lt; four</b><c/>tail</a>";
    let mut reader = Reader::from_str(doc);
    let mut serialized = String::new();
    loop {
        match reader.next_event().unwrap() {
            Event::Start(e) => {
                serialized.push('<');
                serialized.push_str(e.name_str().unwrap());
                for a in &e.attributes {
                    serialized.push_str(&format!(
                        " {}=\"{}\"",
                        a.name_str().unwrap(),
                        escape_attr(a.value_str().unwrap())
                    ));
                }
                serialized.push('>');
            }
            Event::Empty(e) => {
                serialized.push('<');
                serialized.push_str(e.name_str().unwrap());
                for a in &e.attributes {
                    serialized.push_str(&format!(
                        " {}=\"{}\"",
                        a.name_str().unwrap(),
                        escape_attr(a.value_str().unwrap())
                    ));
                }
                serialized.push_str("/>");
            }
            Event::End(e) => {
                serialized.push_str("</");
                serialized.push_str(e.name_str().unwrap());
                serialized.push('>');
            }
            Event::Text(t) => serialized.push_str(&escape_text(t.as_str().unwrap())),
            Event::Eof => break,
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(events(doc), events(&serialized));
}

#[test]
fn streaming_reader_matches_slice_reader() {
    let doc = "<!DOCTYPE r [<!ENTITY e \"v\">]><r a=\"&e;\"><s>body &amp; soul</s><t/></r>";
    let from_slice = events(doc);

    let cursor = std::io::Cursor::new(doc.as_bytes().to_vec());
    let mut reader = StreamReader::from_reader(cursor);
    let mut from_stream = Vec::new();
    loop {
        let event = reader.next_event().unwrap();
        let done = matches!(event, Event::Eof);
        from_stream.push(render(&event));
        if done {
            break;
        }
    }
    assert_eq!(from_slice, from_stream);
}

#[test]
fn namespace_resolution() {
    let doc = r#"<root xmlns="urn:d" xmlns:p="urn:p"><p:child a="1"/><plain/></root>"#;
    let mut reader = NsReader::from_str(doc);

    reader.next_event().unwrap();
    match reader.next_event().unwrap() {
        Event::Empty(e) => {
            let (uri, local) = reader.resolve_element(&e.name);
            assert_eq!(uri, Some(b"urn:p" as &[u8]));
            assert_eq!(local, b"child");
            let (attr_uri, _) = reader.resolve_attribute(b"a");
            assert_eq!(attr_uri, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    match reader.next_event().unwrap() {
        Event::Empty(e) => {
            let (uri, local) = reader.resolve_element(&e.name);
            assert_eq!(uri, Some(b"urn:d" as &[u8]));
            assert_eq!(local, b"plain");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn bom_and_decl() {
    assert_eq!(
        events("\u{FEFF}<?xml version=\"1.0\"?><r/>"),
        vec!["Decl(1.0,None,None)", "Empty(r,[])", "Eof"]
    );
}

#[test]
fn crlf_normalization() {
    assert_eq!(
        events("<r>a\r\nb\rc</r>"),
        vec!["Start(r,[])", "Text(\"a\\nb\\nc\")", "End(r)", "Eof"]
    );
}

#[test]
fn doctype_body_is_preserved() {
    let doc = "<!DOCTYPE note SYSTEM \"note.dtd\" [<!ELEMENT note (#PCDATA)>]><note/>";
    let stream = events(doc);
    assert_eq!(
        stream[0],
        "DocType(note SYSTEM \"note.dtd\" [<!ELEMENT note (#PCDATA)>])"
    );
}
