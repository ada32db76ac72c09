use mailwright::{Dialer, Message};

fn main() {
    tracing_subscriber::fmt::init();

    let mut m = Message::new();
    m.set_header("From", ["user@localhost"]);
    m.set_header("To", ["root@localhost"]);
    m.set_header("Subject", ["Hello ß☺ example"]);
    m.set_body("text/plain", "Be happy!");

    // Open a local connection on port 25
    let dialer = Dialer::builder("localhost").port(25).build();

    match dialer.dial_and_send(&[m]) {
        Ok(_) => println!("Email sent"),
        Err(e) => panic!("Could not send email: {e:?}"),
    }
}
