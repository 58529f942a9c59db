//! Wire-format responses (§6): `OK =value`, a `!line`/`.` multi-line block,
//! or `ERR message`.

use std::io::{self, Write};

pub enum Response {
    Ok,
    OkValue(String),
    Many(Vec<String>),
    Err(String),
}

impl Response {
    pub fn err(message: impl std::fmt::Display) -> Self {
        Response::Err(message.to_string())
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Response::Ok => writeln!(out, "OK"),
            Response::OkValue(value) => writeln!(out, "OK ={}", value),
            Response::Many(lines) => {
                for line in lines {
                    writeln!(out, "!{}", line)?;
                }
                writeln!(out, ".")
            }
            Response::Err(message) => writeln!(out, "ERR {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(response: &Response) -> String {
        let mut buf = Vec::new();
        response.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn formats_every_response_kind() {
        assert_eq!(render(&Response::Ok), "OK\n");
        assert_eq!(render(&Response::OkValue("1".into())), "OK =1\n");
        assert_eq!(
            render(&Response::Many(vec!["a".into(), "b".into()])),
            "!a\n!b\n.\n"
        );
        assert_eq!(render(&Response::Err("bad".into())), "ERR bad\n");
    }
}
