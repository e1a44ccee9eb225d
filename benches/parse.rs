use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pullxml::{Event, Reader};

static FEED: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example feed</title>
  <updated>2024-01-01T00:00:00Z</updated>
  <author><name>Example Author</name></author>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <entry>
    <title>Entry one &amp; only</title>
    <link href="http://example.org/2024/01/01/entry1"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>Some &lt;escaped&gt; text with a &#169; sign</summary>
    <content type="xhtml">
      <div xmlns="http://www.w3.org/1999/xhtml">
        <p>Paragraph with <em>markup</em> and more text to scan past.</p>
      </div>
    </content>
  </entry>
  <entry>
    <title>Entry two</title>
    <link href="http://example.org/2024/01/02/entry2"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6b</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <summary><![CDATA[raw <content> kept as-is]]></summary>
  </entry>
</feed>"#;

fn count_events(input: &[u8]) -> usize {
    let mut reader = Reader::from_bytes(input);
    let mut count = 0;
    loop {
        match reader.next_event().expect("benchmark document is well formed") {
            Event::Eof => return count,
            _ => count += 1,
        }
    }
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_atom_feed", |b| {
        b.iter(|| count_events(black_box(FEED)))
    });

    let mut large = Vec::new();
    large.extend_from_slice(b"<root>");
    for i in 0..1000 {
        large.extend_from_slice(
            format!("<item id=\"{}\" kind=\"row\">value {} &amp; tail</item>", i, i).as_bytes(),
        );
    }
    large.extend_from_slice(b"</root>");
    c.bench_function("parse_many_elements", |b| {
        b.iter(|| count_events(black_box(&large)))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
