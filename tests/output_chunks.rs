use std::collections::VecDeque;
use std::io::{self, Read};

use hostrun::transport::read_chunks;

/// Hands out one scripted read per call.
struct Scripted(VecDeque<io::Result<Vec<u8>>>);

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.pop_front() {
            None => Ok(0),
            Some(Err(err)) => Err(err),
            Some(Ok(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
        }
    }
}

fn scripted(reads: Vec<io::Result<Vec<u8>>>) -> Scripted {
    Scripted(reads.into())
}

#[test]
fn split_characters_are_held_until_complete() {
    let e_acute = "é".as_bytes();
    let source = scripted(vec![
        Ok([b"h".as_slice(), &e_acute[..1]].concat()),
        Ok([&e_acute[1..], b"llo".as_slice()].concat()),
    ]);

    let mut chunks = Vec::new();
    let read = read_chunks(source, |chunk| chunks.push(chunk));

    assert!(read.is_ok());
    assert_eq!(chunks, ["h", "éllo"]);
}

#[test]
fn interrupted_reads_are_retried() {
    let source = scripted(vec![
        Ok(b"one ".to_vec()),
        Err(io::Error::from(io::ErrorKind::Interrupted)),
        Ok(b"two".to_vec()),
    ]);

    let mut text = String::new();
    assert!(read_chunks(source, |chunk| text.push_str(&chunk)).is_ok());
    assert_eq!(text, "one two");
}

#[test]
fn read_error_is_reported_after_emitting_what_was_read() {
    let source = scripted(vec![
        Ok(b"partial ".to_vec()),
        Ok("é".as_bytes()[..1].to_vec()),
        Err(io::Error::other("pipe broke")),
        Ok(b"never seen".to_vec()),
    ]);

    let mut chunks = Vec::new();
    let err = read_chunks(source, |chunk| chunks.push(chunk)).unwrap_err();

    assert_eq!(err.to_string(), "pipe broke");
    assert_eq!(chunks, ["partial ", "\u{fffd}"]);
}
