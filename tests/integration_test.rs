use std::time::Duration;

use komob::client::*;
use komob::server::*;
use komob::store::{BitKind, RegisterKind, RegisterMap, RegisterStore};
use komob::*;

async fn start_pair() -> (Channel, ServerHandle, ServerHandlerType<RegisterStore>) {
    let store = RegisterStore::new(RegisterMap::uniform(32)).wrap();

    let server = spawn_tcp_server_task(
        4,
        "127.0.0.1:0".parse().unwrap(),
        ServerHandlerMap::single(UnitId::new(1), store.clone()),
        DecodeLevel::default(),
    )
    .await
    .unwrap();

    let channel = connect_tcp_client(server.local_addr(), 16, DecodeLevel::default())
        .await
        .unwrap();

    (channel, server, store)
}

fn params() -> RequestParam {
    RequestParam::new(UnitId::new(0x01), Duration::from_secs(1))
}

#[tokio::test]
async fn reads_and_writes_all_cell_kinds() {
    let (mut channel, _server, store) = start_pair().await;
    let params = params();

    // seed the kinds that are read-only over the wire through the snapshot seam
    {
        let mut guard = store.lock().unwrap();
        let mut snapshot = guard.snapshot();
        snapshot.discrete_inputs[0] = true;
        snapshot.input_registers[0] = 0xCAFE;
        guard.restore(snapshot);
    }

    assert_eq!(
        channel
            .read_discrete_inputs(params, AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, true), Indexed::new(1, false)]
    );

    assert_eq!(
        channel
            .read_input_registers(params, AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, 0xCAFE), Indexed::new(1, 0x0000)]
    );

    // do a single coil write and verify that it was written by reading it
    assert_eq!(
        channel
            .write_single_coil(params, Indexed::new(1, true))
            .await
            .unwrap(),
        Indexed::new(1, true)
    );
    assert_eq!(
        channel
            .read_coils(params, AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, false), Indexed::new(1, true)]
    );

    // do a single register write and verify that it was written by reading it
    assert_eq!(
        channel
            .write_single_register(params, Indexed::new(1, 0xABCD))
            .await
            .unwrap(),
        Indexed::new(1, 0xABCD)
    );
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, 0x0000), Indexed::new(1, 0xABCD)]
    );

    // write multiple coils and verify that they were written
    assert_eq!(
        channel
            .write_multiple_coils(
                params,
                WriteMultiple::from(0, vec![true, true, true]).unwrap()
            )
            .await
            .unwrap(),
        AddressRange::try_from(0, 3).unwrap()
    );
    assert_eq!(
        channel
            .read_coils(params, AddressRange::try_from(0, 3).unwrap())
            .await
            .unwrap(),
        vec![
            Indexed::new(0, true),
            Indexed::new(1, true),
            Indexed::new(2, true)
        ]
    );

    // write multiple registers and verify that they were written
    assert_eq!(
        channel
            .write_multiple_registers(
                params,
                WriteMultiple::from(0, vec![0x0102, 0x0304, 0x0506]).unwrap()
            )
            .await
            .unwrap(),
        AddressRange::try_from(0, 3).unwrap()
    );
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(0, 3).unwrap())
            .await
            .unwrap(),
        vec![
            Indexed::new(0, 0x0102),
            Indexed::new(1, 0x0304),
            Indexed::new(2, 0x0506)
        ]
    );
}

#[tokio::test]
async fn composite_u32_spans_two_registers_high_word_first() {
    let (mut channel, _server, store) = start_pair().await;
    let params = params();

    channel.write_u32(params, 0x10, 0x12345678).await.unwrap();

    // the server stores the high word at 0x10 and the low word at 0x11
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(0x10, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0x10, 0x1234), Indexed::new(0x11, 0x5678)]
    );
    assert_eq!(channel.read_u32(params, 0x10).await.unwrap(), 0x12345678);

    // the extremes of the u32 range round-trip as well
    channel.write_u32(params, 0x10, u32::MAX).await.unwrap();
    assert_eq!(channel.read_u32(params, 0x10).await.unwrap(), u32::MAX);
    channel.write_u32(params, 0x10, 0).await.unwrap();
    assert_eq!(channel.read_u32(params, 0x10).await.unwrap(), 0);

    {
        let guard = store.lock().unwrap();
        assert_eq!(
            guard
                .read_registers(RegisterKind::Holding, AddressRange::try_from(0x10, 2).unwrap())
                .unwrap(),
            vec![0x0000, 0x0000]
        );
    }
}

#[tokio::test]
async fn server_answers_bad_requests_with_exceptions() {
    let (mut channel, _server, store) = start_pair().await;
    let params = params();

    // the map has 32 cells per kind, so address 32 is out of bounds
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(30, 3).unwrap())
            .await,
        Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
    );

    // a partially out-of-bounds multi-write is rejected without changing anything
    assert_eq!(
        channel
            .write_multiple_registers(
                params,
                WriteMultiple::from(30, vec![0xAAAA, 0xBBBB, 0xCCCC]).unwrap()
            )
            .await,
        Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
    );
    {
        let guard = store.lock().unwrap();
        assert_eq!(
            guard
                .read_registers(RegisterKind::Holding, AddressRange::try_from(30, 2).unwrap())
                .unwrap(),
            vec![0x0000, 0x0000]
        );
    }

    // the store also never lets the wire touch read-only kinds
    {
        let mut guard = store.lock().unwrap();
        assert_eq!(
            guard.write_bits(BitKind::DiscreteInput, 0, &[true]),
            Err(ExceptionCode::IllegalFunction)
        );
    }
}

#[tokio::test]
async fn request_for_unmapped_unit_id_times_out() {
    let (mut channel, _server, _store) = start_pair().await;

    // the server drops frames for unknown units rather than answering them
    let params = RequestParam::new(UnitId::new(0x42), Duration::from_millis(100));
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(0, 1).unwrap())
            .await,
        Err(RequestError::ResponseTimeout)
    );

    // the timeout cancels only that request; the connection still works
    let params = RequestParam::new(UnitId::new(0x01), Duration::from_secs(1));
    assert_eq!(
        channel
            .read_holding_registers(params, AddressRange::try_from(0, 1).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, 0x0000)]
    );
}

#[tokio::test]
async fn pipelined_requests_on_one_connection_complete_independently() {
    let (channel, _server, _store) = start_pair().await;
    let params = params();

    let mut tasks = Vec::new();
    for i in 0..8u16 {
        let mut channel = channel.clone();
        tasks.push(tokio::spawn(async move {
            let value = 0x1000 + i;
            channel
                .write_single_register(params, Indexed::new(i, value))
                .await?;
            channel
                .read_holding_registers(params, AddressRange::try_from(i, 1).unwrap())
                .await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result, vec![Indexed::new(i as u16, 0x1000 + i as u16)]);
    }
}

#[tokio::test]
async fn requests_fail_when_the_server_goes_away() {
    let (mut channel, server, _store) = start_pair().await;
    let params = params();

    // prove the connection works, then take the server down
    channel
        .read_holding_registers(params, AddressRange::try_from(0, 1).unwrap())
        .await
        .unwrap();
    drop(server);

    // the client observes the closed connection as an error, never a hang
    let mut saw_error = false;
    for _ in 0..10 {
        match channel
            .read_holding_registers(params, AddressRange::try_from(0, 1).unwrap())
            .await
        {
            Ok(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            Err(_) => {
                saw_error = true;
                break;
            }
        }
    }
    assert!(saw_error);
}
