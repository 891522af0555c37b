use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nexus_execution::condition::{self, Bound, Condition};
use nexus_types::{
    address,
    condition::{Program, Token},
    contract::{Contract, Primitive},
    object, Address, Register,
};

fn bounds() -> (Bound, Bound) {
    let alice = Address::genesis(b"alice", address::RESERVED);
    let bob = Address::genesis(b"bob", address::RESERVED);
    let account = Address::from_name("account", address::ACCOUNT);

    let debit = Contract::new(Primitive::Debit {
        from: account,
        to: Address::WILDCARD,
        amount: 100,
    });
    let mut credit = Contract::new(Primitive::Credit {
        txid: [7u8; 32].into(),
        contract: 0,
        to: account,
        proof: account,
        amount: 100,
    });
    let mut balance = object::account(&Address::NULL).unwrap();
    balance.set_u64("balance", 50).unwrap();
    credit.prestate = Some(Register::from_object(bob, 900, &balance));

    (Bound::new(&debit, alice, 1_000), Bound::new(&credit, bob, 2_000))
}

/// A chain of `terms` timestamp comparisons joined by AND.
fn program(terms: usize) -> Vec<u8> {
    let mut program = Program::new();
    for i in 0..terms {
        if i > 0 {
            program = program.token(Token::And);
        }
        program = program
            .token(Token::CallerTimestamp)
            .token(Token::GreaterThan)
            .token(Token::ThisTimestamp)
            .token(Token::Add)
            .uint64(i as u64);
    }
    program.build()
}

fn condition_execute(c: &mut Criterion) {
    let (this, caller) = bounds();
    let mut group = c.benchmark_group("condition_execute");
    for terms in [1usize, 10, 100] {
        let program = program(terms);
        group.bench_function(BenchmarkId::new("timestamps", terms), |b| {
            b.iter(|| {
                let mut condition = Condition::new(&program, &this, &caller);
                black_box(condition.execute().unwrap())
            })
        });
    }

    let hashing = Program::new()
        .prestate_value("balance")
        .token(Token::Sha256)
        .token(Token::NotEquals)
        .uint8(0)
        .build();
    group.bench_function("prestate_sha256", |b| {
        b.iter(|| {
            let mut condition = Condition::new(&hashing, &this, &caller);
            black_box(condition.execute().unwrap())
        })
    });
    group.finish();
}

fn condition_verify(c: &mut Criterion) {
    let (this, _) = bounds();
    let program = program(100);
    c.bench_function("condition_verify", |b| {
        b.iter(|| black_box(condition::verify(&program, &this).unwrap()))
    });
}

criterion_group!(benches, condition_execute, condition_verify);
criterion_main!(benches);
