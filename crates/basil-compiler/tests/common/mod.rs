//! Shared IR fixtures for integration tests

#![allow(dead_code)]

use basil_compiler::ir::{
    BinaryOp, BlockId, CompareOp, FunctionBuilder, IrClass, IrConstant, IrField, IrFunction,
    IrGlobal, IrInstr, IrModule, IrType, Variable,
};

/// `Max(a, b)`: entry branches to two arms that meet in a phi
pub fn diamond() -> IrFunction {
    let a = Variable::param("a", IrType::Integer);
    let b = Variable::param("b", IrType::Integer);
    let mut fb = FunctionBuilder::new("Max", vec![a.clone(), b.clone()], IrType::Integer);
    let then_block = fb.create_block();
    let else_block = fb.create_block();
    let join = fb.create_block();

    let x = fb.load_var(a);
    let y = fb.load_var(b);
    let cond = fb.compare(CompareOp::Gt, x.clone(), y.clone());
    fb.branch(cond, then_block, else_block);
    fb.switch_to_block(then_block);
    fb.jump(join);
    fb.switch_to_block(else_block);
    fb.jump(join);
    fb.switch_to_block(join);
    let result = fb.phi(
        IrType::Integer,
        vec![(then_block, x.into()), (else_block, y.into())],
    );
    fb.ret(Some(result.into()));
    fb.finish().unwrap()
}

/// `Sum(n)`: adds 0..n in a loop
///
/// ```text
/// bb0: jump bb1
/// bb1: i = phi [bb0: 0, bb2: i2]; acc = phi [bb0: 0, bb2: acc2]
///      limit = n; c = i < limit; branch c bb2 bb3
/// bb2: acc2 = acc + i; step = 1; i2 = i + step; jump bb1
/// bb3: return acc
/// ```
pub fn counting_loop() -> IrFunction {
    let n = Variable::param("n", IrType::Integer);
    let mut fb = FunctionBuilder::new("Sum", vec![n.clone()], IrType::Integer);
    let header = fb.create_block();
    let body = fb.create_block();
    let exit = fb.create_block();
    let entry = BlockId(0);

    fb.jump(header);

    let next_i = fb.alloc_reg(IrType::Integer);
    let next_acc = fb.alloc_reg(IrType::Integer);

    fb.switch_to_block(header);
    let i = fb.phi(
        IrType::Integer,
        vec![
            (entry, IrConstant::integer(0).into()),
            (body, next_i.clone().into()),
        ],
    );
    let acc = fb.phi(
        IrType::Integer,
        vec![
            (entry, IrConstant::integer(0).into()),
            (body, next_acc.clone().into()),
        ],
    );
    let limit = fb.load_var(n);
    let cond = fb.compare(CompareOp::Lt, i.clone(), limit);
    fb.branch(cond, body, exit);

    fb.switch_to_block(body);
    fb.emit(IrInstr::Binary {
        dest: next_acc,
        op: BinaryOp::Add,
        left: acc.clone().into(),
        right: i.clone().into(),
    });
    let step = fb.const_int(1);
    fb.emit(IrInstr::Binary {
        dest: next_i,
        op: BinaryOp::Add,
        left: i.into(),
        right: step.into(),
    });
    fb.jump(header);

    fb.switch_to_block(exit);
    fb.ret(Some(acc.into()));
    fb.finish().unwrap()
}

/// `Answer()`: returns `6 * 7 + 0`
pub fn constant_expression() -> IrFunction {
    let mut fb = FunctionBuilder::new("Answer", vec![], IrType::Integer);
    let six = fb.const_int(6);
    let seven = fb.const_int(7);
    let product = fb.binary(BinaryOp::Mul, six, seven);
    let zero = fb.const_int(0);
    let sum = fb.binary(BinaryOp::Add, product, zero);
    fb.ret(Some(sum.into()));
    fb.finish().unwrap()
}

/// A module touching globals, a class with a method, a loop and a diamond
pub fn sample_module() -> IrModule {
    let mut module = IrModule::new("sample");
    module.add_global(IrGlobal::new("total", IrType::Long));
    module.add_global(IrGlobal::constant("Greeting", IrConstant::string("hi \"there\"")));

    let mut counter = IrClass::new("Counter");
    counter.add_field(IrField::new("Count", IrType::Integer));
    module.add_class(counter);

    let me = Variable::param("Me", IrType::class("Counter"));
    let mut fb = FunctionBuilder::new("Increment", vec![me.clone()], IrType::Void);
    let current = fb.alloc_reg(IrType::Integer);
    fb.emit(IrInstr::LoadField {
        dest: current.clone(),
        object: me.clone().into(),
        field: "Count".to_string(),
    });
    let next = fb.binary(BinaryOp::Add, current, IrConstant::integer(1));
    fb.emit(IrInstr::StoreField {
        object: me.into(),
        field: "Count".to_string(),
        value: next.into(),
    });
    fb.ret(None);
    let mut increment = fb.finish().unwrap();
    increment.class = Some("Counter".to_string());
    increment.doc = Some("Adds one to the counter".to_string());
    module.add_function(increment);

    module.add_function(diamond());
    module.add_function(counting_loop());
    module.add_function(constant_expression());

    let mut fb = FunctionBuilder::new("Main", vec![], IrType::Void);
    let max = fb
        .call(
            "Max",
            vec![IrConstant::integer(3).into(), IrConstant::integer(4).into()],
            IrType::Integer,
        )
        .unwrap();
    let sum = fb.call("Sum", vec![max.into()], IrType::Integer).unwrap();
    let widened = fb.alloc_reg(IrType::Long);
    fb.emit(IrInstr::Cast {
        dest: widened.clone(),
        value: sum.into(),
    });
    fb.assign(Variable::global("total", IrType::Long), widened);
    fb.ret(None);
    module.add_function(fb.finish().unwrap());

    module
}
