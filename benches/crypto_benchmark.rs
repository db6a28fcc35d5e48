use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use wmbus_rs::wmbus::crypto::{
    apply_aes_ctr, decrypt_aes_cbc, ell_iv, encrypt_aes_cbc, mode5_iv, pad_with_filler,
};
use wmbus_rs::{crc16, AesKey, WmBusFrame};

fn bench_key() -> AesKey {
    AesKey::from_hex("000102030405060708090A0B0C0D0E0F").unwrap()
}

fn bench_frame() -> WmBusFrame {
    WmBusFrame {
        length: 0x1E,
        control: 0x44,
        manufacturer: 0x4DEE,
        device_id: 0x76160190,
        version: 0x3C,
        device_type: 0x06,
        control_info: 0x7A,
        payload: Vec::new(),
    }
}

fn benchmark_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc16");

    group.bench_function("check_string", |b| {
        b.iter(|| {
            black_box(crc16(black_box(b"123456789")));
        });
    });

    let frame = [0xA5u8; 64];
    group.bench_function("frame_64_bytes", |b| {
        b.iter(|| {
            black_box(crc16(black_box(&frame)));
        });
    });

    group.finish();
}

fn benchmark_iv_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("iv_derivation");
    let frame = bench_frame();

    group.bench_function("mode5_iv", |b| {
        b.iter(|| {
            black_box(mode5_iv(black_box(&frame), 0x2A));
        });
    });

    group.bench_function("ell_iv", |b| {
        b.iter(|| {
            black_box(ell_iv(black_box(&frame), 0x20, 0x2012_3456));
        });
    });

    group.finish();
}

fn benchmark_aes_cbc(c: &mut Criterion) {
    let mut group = c.benchmark_group("aes_cbc");
    let key = bench_key();
    let frame = bench_frame();
    let iv = mode5_iv(&frame, 0x2A);

    let mut one_block = vec![0x2F, 0x2F, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    pad_with_filler(&mut one_block);
    let one_block_ct = encrypt_aes_cbc(&key, &one_block, &iv).unwrap();

    let mut four_blocks = one_block.clone();
    four_blocks.extend_from_slice(&[0x2F; 48]);
    let four_blocks_ct = encrypt_aes_cbc(&key, &four_blocks, &iv).unwrap();

    group.bench_function("decrypt_1_block", |b| {
        b.iter(|| {
            let _ = decrypt_aes_cbc(&key, black_box(&one_block_ct), &iv);
        });
    });

    group.bench_function("decrypt_4_blocks", |b| {
        b.iter(|| {
            let _ = decrypt_aes_cbc(&key, black_box(&four_blocks_ct), &iv);
        });
    });

    group.finish();
}

fn benchmark_aes_ctr(c: &mut Criterion) {
    let mut group = c.benchmark_group("aes_ctr");
    let key = bench_key();
    let frame = bench_frame();
    let iv = ell_iv(&frame, 0x20, 0x2012_3456);

    let inner = [0x78, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    let mut payload = crc16(&inner).to_le_bytes().to_vec();
    payload.extend_from_slice(&inner);
    let ciphertext = apply_aes_ctr(&key, &payload, &iv);

    group.bench_function("keystream_9_bytes", |b| {
        b.iter(|| {
            black_box(apply_aes_ctr(&key, black_box(&ciphertext), &iv));
        });
    });

    let long = [0x55u8; 48];
    group.bench_function("keystream_48_bytes", |b| {
        b.iter(|| {
            black_box(apply_aes_ctr(&key, black_box(&long), &iv));
        });
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(5));
    targets = benchmark_crc,
              benchmark_iv_derivation,
              benchmark_aes_cbc,
              benchmark_aes_ctr
}
criterion_main!(benches);
