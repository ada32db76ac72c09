use mailwright::{
    transport::smtp::{authentication::Mechanism, client::TlsParameters},
    Dialer, Message,
};

fn main() {
    tracing_subscriber::fmt::init();

    let mut m = Message::new();
    m.set_address_header("From", "nobody@domain.tld", "NoBody");
    m.set_address_header("Reply-To", "yuin@domain.tld", "Yuin");
    m.set_address_header("To", "hei@domain.tld", "Hei");
    m.set_header("Subject", ["Happy new year"]);
    m.add_alternative("text/plain", "Be happy!");
    m.add_alternative("text/html", "<p>Be <b>happy</b>!</p>");

    let tls = TlsParameters::builder("smtp.gmail.com")
        .build_native()
        .expect("native TLS connector");

    // Open a remote connection to gmail using STARTTLS
    let dialer = Dialer::builder("smtp.gmail.com")
        .port(587)
        .credentials(("smtp_username", "smtp_password").into())
        .mechanisms(vec![Mechanism::Plain, Mechanism::Login])
        .tls_parameters(tls)
        .build();

    match dialer.dial_and_send(&[m]) {
        Ok(_) => println!("Email sent successfully!"),
        Err(e) => panic!("Could not send email: {e:?}"),
    }
}
