//! End-to-end loopback tests for exprwire.
//!
//! Each test runs a scripted peer on a background thread: it accepts the
//! handshake, consumes INVOKE frames, and writes replies (sometimes a few
//! bytes at a time to exercise the incremental readers).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use exprwire::protocol::{read_len_bytes, read_len_string, CMD_DEFEXPR, CMD_INVOKE};
use exprwire::{
    async_rpc_client, wire_variant, AsyncClient, AsyncDef, Client, ExprwireError, NetStream,
    RpcDef, Wire,
};

/// Spawn a scripted peer; returns the client-side stream and the peer's
/// join handle.
fn scripted_peer<F>(script: F) -> (NetStream, thread::JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        script(stream);
    });
    let client = TcpStream::connect(addr).unwrap();
    (NetStream::Tcp(client), handle)
}

/// Accept a handshake of `n_defs` definitions, returning their ids.
fn accept_handshake(s: &mut TcpStream, n_defs: usize) -> Vec<u32> {
    let mut version = [0u8; 4];
    s.read_exact(&mut version).unwrap();
    assert_eq!(u32::from_ne_bytes(version), 0x0001_0000);

    let mut ids = Vec::new();
    for _ in 0..n_defs {
        let mut cmd = [0u8; 1];
        s.read_exact(&mut cmd).unwrap();
        assert_eq!(cmd[0], CMD_DEFEXPR);

        let mut id = [0u8; 4];
        s.read_exact(&mut id).unwrap();
        ids.push(u32::from_ne_bytes(id));

        read_len_string(s).unwrap(); // expr
        read_len_bytes(s).unwrap(); // input type
        read_len_bytes(s).unwrap(); // output type

        s.write_all(&[1]).unwrap(); // accept
    }
    ids
}

/// Read an INVOKE header, returning the RPC id.
fn read_invoke_header(s: &mut TcpStream) -> u32 {
    let mut cmd = [0u8; 1];
    s.read_exact(&mut cmd).unwrap();
    assert_eq!(cmd[0], CMD_INVOKE);

    let mut id = [0u8; 4];
    s.read_exact(&mut id).unwrap();
    u32::from_ne_bytes(id)
}

/// Write `bytes` a few at a time with flushes in between, so the client
/// sees the reply in fragments.
fn send_chunked(s: &mut TcpStream, bytes: &[u8], chunk: usize) {
    for c in bytes.chunks(chunk) {
        s.write_all(c).unwrap();
        s.flush().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
}

/// Scenario: a void RPC with two ints emits exactly the command byte, the
/// id, and both arguments, and the session stays usable afterwards.
#[test]
fn test_void_rpc_frame_bytes() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 1);

        let mut frame = [0u8; 13];
        s.read_exact(&mut frame).unwrap();

        let mut expected = Vec::new();
        expected.push(0x02u8);
        expected.extend_from_slice(&1u32.to_ne_bytes());
        expected.extend_from_slice(&7i32.to_ne_bytes());
        expected.extend_from_slice(&8i32.to_ne_bytes());
        assert_eq!(&frame[..], &expected[..]);

        #[cfg(target_endian = "little")]
        assert_eq!(
            frame,
            [0x02, 0x01, 0, 0, 0, 0x07, 0, 0, 0, 0x08, 0, 0, 0]
        );

        // The next call on the same session arrives intact too.
        let mut frame = [0u8; 13];
        s.read_exact(&mut frame).unwrap();
        assert_eq!(frame[0], 0x02);
    });

    let defs = vec![RpcDef::define::<(i32, i32), ()>(1, "printPair")];
    let mut client = Client::from_stream(stream, defs).unwrap();

    client.call_void(1, &(7i32, 8i32)).unwrap();
    client.call_void(1, &(9i32, 10i32)).unwrap();
    peer.join().unwrap();
}

/// Scenario: the peer rejects a definition; the client surfaces the id,
/// the expression, and the peer's message, and the socket can be dropped.
#[test]
fn test_handshake_rejection() {
    let (stream, peer) = scripted_peer(|mut s| {
        let mut version = [0u8; 4];
        s.read_exact(&mut version).unwrap();

        let mut cmd_and_id = [0u8; 5];
        s.read_exact(&mut cmd_and_id).unwrap();
        read_len_string(&mut s).unwrap();
        read_len_bytes(&mut s).unwrap();
        read_len_bytes(&mut s).unwrap();

        s.write_all(&[0]).unwrap(); // FAIL
        exprwire::protocol::write_len_str(&mut s, "unknown symbol foo").unwrap();
    });

    let defs = vec![RpcDef::define::<(i32,), i32>(5, "foo")];
    match Client::from_stream(stream, defs) {
        Err(ExprwireError::HandshakeRejected { id, expr, msg }) => {
            assert_eq!(id, 5);
            assert_eq!(expr, "foo");
            assert_eq!(msg, "unknown symbol foo");
        }
        other => panic!("expected HandshakeRejected, got {other:?}"),
    }
    peer.join().unwrap();
}

/// Scenario: a string reply delivered in 1-3 byte fragments is reassembled
/// across repeated `step` calls, and the continuation fires exactly once.
#[test]
fn test_async_string_reassembly() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 1);
        assert_eq!(read_invoke_header(&mut s), 1);

        let mut reply = Vec::new();
        reply.extend_from_slice(&7u64.to_ne_bytes());
        reply.extend_from_slice(b"hellowo");
        send_chunked(&mut s, &reply, 3);
    });

    let defs = vec![AsyncDef::returning::<(), String>(1, "greeting")];
    let mut client = AsyncClient::from_stream(stream, defs).unwrap();

    let fired: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = fired.clone();
    client
        .invoke::<(), String>(1, &(), move |s| sink.borrow_mut().push(s))
        .unwrap();
    assert_eq!(client.pending(), 1);

    while client.pending() > 0 {
        client.step().unwrap();
    }

    assert_eq!(fired.borrow().as_slice(), ["hellowo".to_string()]);
    peer.join().unwrap();
}

wire_variant! {
    enum IntOrStr {
        0 => F0(".f0", i32),
        1 => F1(".f1", String),
    }
}

/// Scenario: a variant reply - the reader determines the tag first, then
/// reassembles the payload of the indicated constructor.
#[test]
fn test_async_variant_reply() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 1);
        read_invoke_header(&mut s);

        let mut reply = Vec::new();
        reply.extend_from_slice(&1u32.to_ne_bytes()); // tag .f1
        reply.extend_from_slice(&3u64.to_ne_bytes()); // string length
        reply.extend_from_slice(b"foo");
        send_chunked(&mut s, &reply, 2);
    });

    let defs = vec![AsyncDef::returning::<(), IntOrStr>(1, "pick")];
    let mut client = AsyncClient::from_stream(stream, defs).unwrap();

    let got: Rc<RefCell<Option<IntOrStr>>> = Rc::new(RefCell::new(None));
    let sink = got.clone();
    client
        .invoke::<(), IntOrStr>(1, &(), move |v| *sink.borrow_mut() = Some(v))
        .unwrap();

    while client.pending() > 0 {
        client.step().unwrap();
    }

    assert_eq!(got.borrow().clone(), Some(IntOrStr::F1("foo".to_string())));
    peer.join().unwrap();
}

/// Scenario: a map reply visits LEN, then KEY/VAL per entry, and the final
/// map holds every pair.
#[test]
fn test_map_reply() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 1);
        read_invoke_header(&mut s);

        let mut expected = BTreeMap::new();
        expected.insert(1i32, "a".to_string());
        expected.insert(2i32, "bb".to_string());

        let mut reply = Vec::new();
        <BTreeMap<i32, String> as Wire>::write(&mut reply, &expected).unwrap();
        send_chunked(&mut s, &reply, 3);
    });

    let defs = vec![AsyncDef::returning::<(), BTreeMap<i32, String>>(1, "table")];
    let mut client = AsyncClient::from_stream(stream, defs).unwrap();

    let got: Rc<RefCell<Option<BTreeMap<i32, String>>>> = Rc::new(RefCell::new(None));
    let sink = got.clone();
    client
        .invoke::<(), BTreeMap<i32, String>>(1, &(), move |m| *sink.borrow_mut() = Some(m))
        .unwrap();

    while client.pending() > 0 {
        client.step().unwrap();
    }

    let mut expected = BTreeMap::new();
    expected.insert(1i32, "a".to_string());
    expected.insert(2i32, "bb".to_string());
    assert_eq!(got.borrow().clone(), Some(expected));
    peer.join().unwrap();
}

/// Scenario: three void calls then three int calls pipelined back to back;
/// continuations fire in submission order with the peer's replies.
#[test]
fn test_pipelined_async_ordering() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 2);

        // Three void invokes, each carrying one i32 argument.
        for _ in 0..3 {
            assert_eq!(read_invoke_header(&mut s), 1);
            let mut arg = [0u8; 4];
            s.read_exact(&mut arg).unwrap();
        }

        // Three value invokes.
        for _ in 0..3 {
            assert_eq!(read_invoke_header(&mut s), 2);
            let mut arg = [0u8; 4];
            s.read_exact(&mut arg).unwrap();
        }

        // Replies to the value invokes, in order.
        for reply in [10i32, 20, 30] {
            s.write_all(&reply.to_ne_bytes()).unwrap();
        }
        s.flush().unwrap();
    });

    let defs = vec![
        AsyncDef::void::<(i32,)>(1, "note"),
        AsyncDef::returning::<(i32,), i32>(2, "double"),
    ];
    let mut client = AsyncClient::from_stream(stream, defs).unwrap();

    for i in 0..3 {
        client.invoke_void(1, &(i,)).unwrap();
    }
    assert_eq!(client.pending(), 0); // void calls register no reader

    let order: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
    for i in 0..3 {
        let sink = order.clone();
        client
            .invoke::<(i32,), i32>(2, &(i,), move |v| sink.borrow_mut().push(v))
            .unwrap();
    }
    assert_eq!(client.pending(), 3);

    while client.pending() > 0 {
        client.step().unwrap();
    }

    assert_eq!(order.borrow().as_slice(), [10, 20, 30]);
    peer.join().unwrap();
}

/// A large reply delivered in many small socket reads reassembles intact.
#[test]
fn test_large_reply_in_small_reads() {
    let payload: Vec<i32> = (0..10_000).collect();
    let expected = payload.clone();

    let (stream, peer) = scripted_peer(move |mut s| {
        accept_handshake(&mut s, 1);
        read_invoke_header(&mut s);

        let mut reply = Vec::new();
        Vec::<i32>::write(&mut reply, &payload).unwrap();
        send_chunked(&mut s, &reply, 797);
    });

    let defs = vec![AsyncDef::returning::<(), Vec<i32>>(1, "table")];
    let mut client = AsyncClient::from_stream(stream, defs).unwrap();

    let got: Rc<RefCell<Option<Vec<i32>>>> = Rc::new(RefCell::new(None));
    let sink = got.clone();
    client
        .invoke::<(), Vec<i32>>(1, &(), move |v| *sink.borrow_mut() = Some(v))
        .unwrap();

    while client.pending() > 0 {
        client.step().unwrap();
    }

    assert_eq!(got.borrow().clone(), Some(expected));
    peer.join().unwrap();
}

/// Blocking write/read round trip across a real socket for a compound
/// shape: the peer echoes the value through its own codecs.
#[test]
fn test_sync_loopback_roundtrip() {
    type Compound = (i32, String, Vec<f64>);

    let (mut stream, peer) = scripted_peer(|mut s| {
        let mut v = Compound::default();
        Compound::read(&mut s, &mut v).unwrap();
        Compound::write(&mut s, &v).unwrap();
    });

    let sent: Compound = (-7, "echo".to_string(), vec![1.5, -2.25, 0.0]);
    Compound::write(&mut stream, &sent).unwrap();

    let mut back = Compound::default();
    Compound::read(&mut stream, &mut back).unwrap();
    assert_eq!(back, sent);
    peer.join().unwrap();
}

/// A synchronous typed client generated by `rpc_client!` against a
/// scripted peer, non-void and void calls both.
#[test]
fn test_sync_client_call_and_reply() {
    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 2);

        assert_eq!(read_invoke_header(&mut s), 1);
        let mut args = [0u8; 8];
        s.read_exact(&mut args).unwrap();
        let x = i32::from_ne_bytes(args[..4].try_into().unwrap());
        let y = i32::from_ne_bytes(args[4..].try_into().unwrap());
        s.write_all(&((x as i64) + (y as i64)).to_ne_bytes()).unwrap();

        assert_eq!(read_invoke_header(&mut s), 2);
        read_len_bytes(&mut s).unwrap(); // the logged string
    });

    exprwire::rpc_client! {
        struct Calc {
            fn add(x: i32, y: i32) -> i64 = "\\x y -> x + y";
            fn log(msg: String) = "putStrLn";
        }
    }

    let mut calc = Calc::from_stream(stream).unwrap();
    assert_eq!(calc.add(7, 8).unwrap(), 15);
    calc.log("done".to_string()).unwrap();
    peer.join().unwrap();
}

/// The async typed client macro: a void row and a returning row, driven to
/// completion.
#[test]
fn test_async_client_macro() {
    async_rpc_client! {
        struct CalcAsync {
            fn note(x: i32) = "note";
            fn double(x: i32) -> i32 = "\\x -> x * 2";
        }
    }

    let (stream, peer) = scripted_peer(|mut s| {
        accept_handshake(&mut s, 2);

        assert_eq!(read_invoke_header(&mut s), 1);
        let mut arg = [0u8; 4];
        s.read_exact(&mut arg).unwrap();

        assert_eq!(read_invoke_header(&mut s), 2);
        s.read_exact(&mut arg).unwrap();
        let x = i32::from_ne_bytes(arg);
        s.write_all(&(x * 2).to_ne_bytes()).unwrap();
    });

    let mut calc = CalcAsync::from_stream(stream).unwrap();
    calc.note(1).unwrap();

    let got: Rc<RefCell<Option<i32>>> = Rc::new(RefCell::new(None));
    let sink = got.clone();
    calc.double(21, move |v| *sink.borrow_mut() = Some(v)).unwrap();

    while calc.pending() > 0 {
        calc.step().unwrap();
    }
    assert_eq!(*got.borrow(), Some(42));
    peer.join().unwrap();
}

/// Two codecs declaring the same shape produce byte-equal descriptors.
#[test]
fn test_descriptor_agreement_across_codecs() {
    // A map's descriptor is exactly the pair-array's.
    assert_eq!(
        BTreeMap::<i32, String>::descriptor().encode(),
        Vec::<(i32, String)>::descriptor().encode()
    );

    // A record built by the macro matches the positional tuple only in
    // wire form, not in descriptor (names differ); the *same* declaration
    // twice matches bit for bit.
    assert_eq!(
        IntOrStr::descriptor().encode(),
        IntOrStr::descriptor().encode()
    );
}
