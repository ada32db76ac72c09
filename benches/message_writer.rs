use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mailwright::{message::File, Address, Message};

fn simple() -> Message {
    let mut m = Message::new();
    m.set_header("From", ["from@example.com"]);
    m.set_header("To", ["to@example.com"]);
    m.set_header("Subject", ["Café, crème brûlée"]);
    m.set_body("text/plain", "Hello World!");
    m
}

fn complex() -> Message {
    let mut m = simple();
    m.add_alternative("text/html", "<p>Hello <b>World</b>!</p>".repeat(200));
    m.embed_file(File::from_content("logo.png", vec![0x89u8; 8 * 1024]));
    m.attach_file(File::from_content("report.csv", "q1;q2\n10;12\n".repeat(500)));
    m
}

fn criterion_benchmark(c: &mut Criterion) {
    let simple = simple();
    c.bench_function("write simple message", |b| {
        b.iter(|| black_box(&simple).formatted().unwrap())
    });

    let complex = complex();
    c.bench_function("write mixed related alternative message", |b| {
        b.iter(|| black_box(&complex).formatted().unwrap())
    });

    c.bench_function("parse address", |b| {
        b.iter(|| assert!(black_box("test@mail.local").parse::<Address>().is_ok()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
