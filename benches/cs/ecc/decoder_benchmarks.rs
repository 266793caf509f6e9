use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trellis_fec::ecc::{
    hard_slice, AwgnChannel, BcjrDecoder, ConvolutionalCode, GeneratorSet, ViterbiDecoder,
};

const SIZES: [usize; 3] = [64, 256, 1024];

fn noisy_samples(code: &ConvolutionalCode, info_len: usize) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let info: Vec<u8> = (0..info_len).map(|_| rng.gen_range(0..=1)).collect();
    let coded = code.encode_terminated(&info).expect("valid bits");
    AwgnChannel::from_ebn0_db(3.0, code.generators().code_rate())
        .expect("valid channel")
        .transmit(&coded, &mut rng)
        .expect("valid bits")
}

fn bench_viterbi(c: &mut Criterion) {
    let mut group = c.benchmark_group("viterbi");
    let code = ConvolutionalCode::new(GeneratorSet::rate_half_k5());

    for &size in SIZES.iter() {
        let samples = noisy_samples(&code, size);
        let sliced = hard_slice(&samples);
        group.throughput(Throughput::Elements(size as u64));

        let hard = ViterbiDecoder::hard(code.clone());
        group.bench_with_input(BenchmarkId::new("hard", size), &sliced, |b, received| {
            b.iter(|| hard.decode(black_box(received)))
        });

        let soft = ViterbiDecoder::soft(code.clone());
        group.bench_with_input(BenchmarkId::new("soft", size), &samples, |b, received| {
            b.iter(|| soft.decode(black_box(received)))
        });
    }

    group.finish();
}

fn bench_bcjr(c: &mut Criterion) {
    let mut group = c.benchmark_group("bcjr");
    let code = ConvolutionalCode::new(GeneratorSet::rate_half_k5());

    for &size in SIZES.iter() {
        let samples = noisy_samples(&code, size);
        group.throughput(Throughput::Elements(size as u64));

        for assume_termination in [true, false] {
            let decoder = BcjrDecoder::new(code.clone()).with_termination(assume_termination);
            let label = if assume_termination {
                "terminated"
            } else {
                "open"
            };
            group.bench_with_input(BenchmarkId::new(label, size), &samples, |b, received| {
                b.iter(|| decoder.decode(black_box(received)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_viterbi, bench_bcjr);
criterion_main!(benches);
