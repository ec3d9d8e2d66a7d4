use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use tinyweb_http::buffer::RingBuffer;
use tinyweb_http::codec::{decode_form, KeepAlive, RequestParser, ResponseBuilder};
use tinyweb_http::connection::{ConnectionLimits, HttpConnection};
use tinyweb_http::handler::{make_verifier, UserVerifier};

const REQUEST: &[u8] = b"GET /index HTTP/1.1\r\nHost: localhost\r\nUser-Agent: criterion\r\nConnection: keep-alive\r\n\r\n";

fn bench_request_parser(c: &mut Criterion) {
    let verifier = make_verifier(|_: &str, _: &str, _: bool| true);

    c.bench_function("parse_simple_request", |b| {
        b.iter(|| {
            let mut buf = RingBuffer::new();
            buf.append(REQUEST).unwrap();
            let mut parser = RequestParser::new();
            black_box(parser.parse(&mut buf, &verifier).unwrap());
        });
    });

    c.bench_function("parse_wrapped_request", |b| {
        let mut buf = RingBuffer::with_limit(128, 128);
        b.iter(|| {
            // shifts the cursors so the request wraps around the end of the array
            buf.append(&[b'x'; 100]).unwrap();
            buf.consume(100).unwrap();
            buf.append(REQUEST).unwrap();
            let mut parser = RequestParser::new();
            black_box(parser.parse(&mut buf, &verifier).unwrap());
        });
    });
}

fn bench_form_decoder(c: &mut Criterion) {
    let body = "username=alice%40example.com&password=p%26ss+word&remember=on";

    c.bench_function("decode_login_form", |b| {
        b.iter(|| black_box(decode_form(black_box(body)).unwrap()));
    });
}

fn bench_response_builder(c: &mut Criterion) {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), "<html>Hello World!</html>").unwrap();
    let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());

    c.bench_function("build_file_response", |b| {
        b.iter(|| {
            let mut buf = RingBuffer::new();
            builder.init("/index.html", true, None);
            builder.build(&mut buf).unwrap();
            black_box(builder.mapped_len());
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), "<html>Hello World!</html>").unwrap();
    let verifier: Arc<dyn UserVerifier + Send + Sync> = Arc::new(make_verifier(|_: &str, _: &str, _: bool| true));

    c.bench_function("process_simple_request", |b| {
        b.iter(|| {
            let mut connection = HttpConnection::new(root.path(), Arc::clone(&verifier), ConnectionLimits::default());
            let mut out = Vec::with_capacity(256);
            connection.on_readable(&mut Cursor::new(REQUEST)).unwrap();
            connection.process().unwrap();
            black_box(connection.on_writable(&mut out).unwrap());
        });
    });
}

criterion_group!(benches, bench_request_parser, bench_form_decoder, bench_response_builder, bench_http_connection);
criterion_main!(benches);
