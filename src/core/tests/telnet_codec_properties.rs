use antlion::network::telnet_codec::{
    TelnetReader, TelnetWriter, DO, DONT, IAC, SB, SE, WILL, WONT,
};
use proptest::prelude::*;
use tokio::io::ErrorKind;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

async fn encode(data: &[u8]) -> Vec<u8> {
    let mut wire = Vec::new();
    let mut writer = TelnetWriter::new(&mut wire);
    assert_eq!(writer.write(data).await.unwrap(), data.len());
    wire
}

async fn decode(wire: &[u8], chunk: usize) -> Vec<u8> {
    let mut reader = TelnetReader::new(wire);
    let mut buf = vec![0u8; chunk];
    let mut out = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return out,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

fn verb() -> impl Strategy<Value = u8> {
    prop_oneof![Just(WILL), Just(WONT), Just(DO), Just(DONT)]
}

proptest! {
    #[test]
    fn application_bytes_survive_the_wire(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        chunk in 1usize..64,
    ) {
        let wire = block_on(encode(&data));
        let escapes = data.iter().filter(|&&b| b == IAC).count();
        prop_assert_eq!(wire.len(), data.len() + escapes);
        prop_assert_eq!(block_on(decode(&wire, chunk)), data);
    }

    #[test]
    fn negotiation_between_chunks_is_invisible(
        pieces in proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..32), verb(), any::<u8>()),
            0..16,
        ),
        chunk in 1usize..16,
    ) {
        let (wire, expected) = block_on(async {
            let mut wire = Vec::new();
            let mut expected = Vec::new();
            for (data, verb, option) in &pieces {
                wire.extend(encode(data).await);
                wire.extend([IAC, *verb, *option]);
                expected.extend_from_slice(data);
            }
            (wire, expected)
        });
        prop_assert_eq!(block_on(decode(&wire, chunk)), expected);
    }

    #[test]
    fn subnegotiation_payload_is_invisible(
        before in proptest::collection::vec(any::<u8>(), 0..64),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
        after in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let (wire, expected) = block_on(async {
            let mut wire = encode(&before).await;
            wire.extend([IAC, SB]);
            wire.extend(encode(&payload).await);
            wire.extend([IAC, SE]);
            wire.extend(encode(&after).await);
            (wire, [before.clone(), after.clone()].concat())
        });
        prop_assert_eq!(block_on(decode(&wire, 7)), expected);
    }
}
