//! Integration tests for Pascal VOC label files.

use std::path::Path;

use boxlab::codec::{self, voc, LabelFormat, SniffedFormat};
use boxlab::model::{ClassList, ImageSize, LabeledBox};
use boxlab::BoxlabError;
use kurbo::Rect;

mod common;
use common::write_label;

#[test]
fn written_document_reads_back_with_whole_pixel_bounds() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let image = ImageSize::new(320, 240);
    let classes = ClassList::new(["person", "car & truck"]);
    let boxes = [
        LabeledBox::new(Rect::new(10.7, 20.2, 100.9, 200.5), 1),
        LabeledBox::new(Rect::new(0.0, 0.0, 50.0, 60.0), 7),
    ];

    let path = codec::write_labels(
        temp.path(),
        "street",
        LabelFormat::Voc,
        &boxes,
        image,
        &classes,
    )
    .expect("write labels");

    let document = voc::read(&path).expect("read voc");
    assert_eq!(document.size, image);
    assert_eq!(document.objects.len(), 2);

    let first = &document.objects[0];
    assert_eq!(first.name.as_deref(), Some("car & truck"));
    assert_eq!(
        (first.xmin, first.ymin, first.xmax, first.ymax),
        (10.0, 20.0, 100.0, 200.0)
    );
    assert_eq!(document.objects[1].name.as_deref(), Some("cls7"));
}

#[test]
fn decoding_sniffs_by_extension_and_assigns_class_zero() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = write_label(
        temp.path(),
        "a.xml",
        r#"
        <annotation>
          <size><width>200</width><height>100</height><depth>3</depth></size>
          <object>
            <name>dog</name>
            <bndbox><xmin>20</xmin><ymin>10</ymin><xmax>120</xmax><ymax>60</ymax></bndbox>
          </object>
          <object>
            <name>broken</name>
            <bndbox><xmin>50</xmin><ymin>10</ymin><xmax>50</xmax><ymax>60</ymax></bndbox>
          </object>
        </annotation>
        "#,
    );

    assert_eq!(codec::sniff_file(&path).expect("sniff"), SniffedFormat::VocXml);
    let decoded = codec::decode_label_file(&path, None);
    assert_eq!(decoded.format, SniffedFormat::VocXml);
    assert_eq!(decoded.boxes.len(), 1);

    let bbox = decoded.boxes[0].bbox();
    assert_eq!(decoded.boxes[0].class().as_i32(), 0);
    assert!((bbox.x1 - 0.1).abs() < 1e-12);
    assert!((bbox.y1 - 0.1).abs() < 1e-12);
    assert!((bbox.x2 - 0.6).abs() < 1e-12);
    assert!((bbox.y2 - 0.6).abs() < 1e-12);
}

#[test]
fn zero_size_is_rejected() {
    let xml = "<annotation><size><width>0</width><height>10</height></size></annotation>";
    let err = voc::parse_str(xml, Path::new("zero.xml")).expect_err("zero width");
    assert!(matches!(err, BoxlabError::VocXmlParse { .. }));
}

#[test]
fn wrong_root_is_rejected() {
    let err = voc::parse_str("<dataset/>", Path::new("x.xml")).expect_err("bad root");
    assert!(err.to_string().contains("annotation"));
}

#[test]
fn unreadable_xml_decodes_to_nothing() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = write_label(temp.path(), "broken.xml", "<annotation><size>");
    let decoded = codec::decode_label_file(&path, None);
    assert!(decoded.boxes.is_empty());
}
