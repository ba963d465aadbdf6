use simcomm::{DataType, GroupKey, SimcommError, Tensor};
use std::time::Duration;

use super::helpers::{alloc, local_group, run_group, run_on, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_recv_basic() {
    let results = run_group(2, |group| async move {
        match group.self_rank().unwrap() {
            0 => {
                group.send(Tensor::full([10], 7.0f32), 1).await.unwrap();
                None
            }
            _ => {
                let t = group.recv(&[10], DataType::F32, 0, alloc).await.unwrap();
                Some(t)
            }
        }
    })
    .await;

    let received = results[1].as_ref().unwrap();
    assert_eq!(received.shape(), &[10]);
    assert_eq!(received.to_vec::<f32>().unwrap(), vec![7.0; 10]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recv_before_send() {
    let (_driver, groups) = local_group(2, test_config());
    let (sender, receiver) = (groups[0].clone(), groups[1].clone());

    let recv = tokio::spawn(async move { receiver.recv(&[], DataType::I64, 0, alloc).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!recv.is_finished(), "recv must block until the send arrives");

    sender.send(Tensor::scalar(-3i64), 1).await.unwrap();
    let got = recv.await.unwrap().unwrap();
    assert_eq!(got.to_vec::<i64>().unwrap(), vec![-3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_ops_pair_in_order() {
    let (driver, groups) = local_group(2, test_config());

    let results = run_on(groups, |group| async move {
        let mut received = Vec::new();
        for i in 0..3u32 {
            if group.self_rank() == Some(0) {
                group.send(Tensor::full([4], i), 1).await.unwrap();
            } else {
                // Stagger the receiver so the sender is often ahead.
                tokio::time::sleep(Duration::from_millis(5)).await;
                let t = group.recv(&[4], DataType::U32, 0, alloc).await.unwrap();
                received.push(t.to_vec::<u32>().unwrap());
            }
        }
        received
    })
    .await;

    assert_eq!(results[1], vec![vec![0; 4], vec![1; 4], vec![2; 4]]);

    // Every op id was read by both sides and released.
    let comm = driver.registry().get(&GroupKey::p2p(0, 1)).unwrap();
    assert_eq!(comm.pending_ops(), 0);
    assert_eq!(comm.arity(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exchange_in_both_directions() {
    let results = run_group(2, |group| async move {
        let me = group.self_rank().unwrap();
        let peer = 1 - me;
        let mine = Tensor::scalar(me as i32 * 10);
        if me == 0 {
            group.send(mine, peer).await.unwrap();
            group.recv(&[], DataType::I32, peer, alloc).await.unwrap()
        } else {
            let got = group.recv(&[], DataType::I32, peer, alloc).await.unwrap();
            group.send(mine, peer).await.unwrap();
            got
        }
    })
    .await;

    assert_eq!(results[0].to_vec::<i32>().unwrap(), vec![10]);
    assert_eq!(results[1].to_vec::<i32>().unwrap(), vec![0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_allocator_owns_result_buffer() {
    let results = run_group(2, |group| async move {
        if group.self_rank() == Some(0) {
            group.send(Tensor::full([2, 3], 1u8), 1).await.unwrap();
            None
        } else {
            let t = group
                .recv(&[2, 3], DataType::U8, 0, |shape, dtype| {
                    assert_eq!(shape, &[2, 3]);
                    assert_eq!(dtype, DataType::U8);
                    Tensor::full(shape, 9u8)
                })
                .await
                .unwrap();
            Some(t)
        }
    })
    .await;

    assert_eq!(results[1].as_ref().unwrap().to_vec::<u8>().unwrap(), vec![1; 6]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recv_shape_mismatch_fails_and_closes() {
    let results = run_group(2, |group| async move {
        let outcome = if group.self_rank() == Some(0) {
            group.send(Tensor::full([4], 1.0f64), 1).await.map(|_| ())
        } else {
            group
                .recv(&[8], DataType::F64, 0, alloc)
                .await
                .map(|_| ())
        };
        (outcome, group.is_closed())
    })
    .await;

    assert!(results[0].0.is_ok());
    assert!(matches!(
        results[1].0,
        Err(SimcommError::ShapeMismatch { .. })
    ));
    assert!(results[1].1, "receiver must close after a failed recv");
}
