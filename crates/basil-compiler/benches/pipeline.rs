use basil_compiler::ir::{
    BinaryOp, BlockId, CompareOp, FunctionBuilder, IrConstant, IrFunction, IrInstr, IrModule,
    IrType, Variable,
};
use basil_compiler::{BackendRegistry, GenerationOptions, Pipeline};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Small helper that the aggressive tier inlines
fn scale() -> IrFunction {
    let x = Variable::param("x", IrType::Integer);
    let mut fb = FunctionBuilder::new("Scale", vec![x.clone()], IrType::Integer);
    let value = fb.load_var(x);
    let factor = fb.const_int(3);
    let scaled = fb.binary(BinaryOp::Mul, value, factor);
    fb.ret(Some(scaled.into()));
    fb.finish().unwrap()
}

/// A loop with an invariant product, a foldable chain and a call to `Scale`
fn worker(index: usize) -> IrFunction {
    let n = Variable::param("n", IrType::Integer);
    let mut fb = FunctionBuilder::new(format!("Work{}", index), vec![n.clone()], IrType::Integer);
    let header = fb.create_block();
    let body = fb.create_block();
    let exit = fb.create_block();
    let entry = BlockId(0);

    let base = fb.const_int(index as i64);
    let two = fb.const_int(2);
    let seed = fb.binary(BinaryOp::Mul, base, two);
    fb.jump(header);

    let next_i = fb.alloc_reg(IrType::Integer);
    let next_acc = fb.alloc_reg(IrType::Integer);

    fb.switch_to_block(header);
    let i = fb.phi(
        IrType::Integer,
        vec![(entry, IrConstant::integer(0).into()), (body, next_i.clone().into())],
    );
    let acc = fb.phi(
        IrType::Integer,
        vec![(entry, seed.into()), (body, next_acc.clone().into())],
    );
    let limit = fb.load_var(n.clone());
    let cond = fb.compare(CompareOp::Lt, i.clone(), limit);
    fb.branch(cond, body, exit);

    fb.switch_to_block(body);
    let bound = fb.load_var(n);
    let invariant = fb.binary(BinaryOp::Mul, bound, IrConstant::integer(4));
    let scaled = fb
        .call("Scale", vec![i.clone().into()], IrType::Integer)
        .unwrap();
    let partial = fb.binary(BinaryOp::Add, acc.clone(), scaled);
    fb.emit(IrInstr::Binary {
        dest: next_acc,
        op: BinaryOp::Add,
        left: partial.into(),
        right: invariant.into(),
    });
    fb.emit(IrInstr::Binary {
        dest: next_i,
        op: BinaryOp::Add,
        left: i.into(),
        right: IrConstant::integer(1).into(),
    });
    fb.jump(header);

    fb.switch_to_block(exit);
    fb.ret(Some(acc.into()));
    fb.finish().unwrap()
}

fn module_with(functions: usize) -> IrModule {
    let mut module = IrModule::new("bench");
    module.add_function(scale());
    for index in 0..functions {
        module.add_function(worker(index));
    }
    module
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");

    for size in [10, 100] {
        let module = module_with(size);
        group.bench_with_input(BenchmarkId::new("standard", size), &module, |b, module| {
            b.iter(|| {
                let mut module = module.clone();
                Pipeline::standard()
                    .optimize_module(black_box(&mut module))
                    .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("full", size), &module, |b, module| {
            b.iter(|| {
                let mut module = module.clone();
                Pipeline::full()
                    .optimize_module(black_box(&mut module))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let mut module = module_with(100);
    Pipeline::full().optimize_module(&mut module).unwrap();
    let registry = BackendRegistry::with_builtins();
    let options = GenerationOptions::default();

    for name in registry.list_registered_names() {
        group.bench_function(&name, |b| {
            b.iter(|| {
                let mut generator = registry.create_named(&name, &options).unwrap();
                generator.generate(black_box(&module)).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_optimize, bench_generate);
criterion_main!(benches);
