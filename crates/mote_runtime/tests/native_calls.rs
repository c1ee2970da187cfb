use mote_runtime::{Error, Runtime, Value};

fn sum(_rt: &mut Runtime, _this: Value, args: &[Value]) -> Result<Value, Error> {
    let mut total = 0.0;
    for a in args {
        total += a.try_number()?;
    }
    Ok(Value::number(total))
}

fn who(rt: &mut Runtime, this: Value, _args: &[Value]) -> Result<Value, Error> {
    rt.get_prop(this, "name")
}

#[test]
fn natives_receive_arguments_in_order() {
    let mut rt = Runtime::new();
    let global = rt.global();
    rt.set_method(global, "sum", sum).unwrap();
    assert_eq!(rt.exec("sum(1, 2, 3, 4)").unwrap().as_number(), 10.0);
    assert_eq!(rt.exec("sum()").unwrap().as_number(), 0.0);
}

#[test]
fn natives_receive_the_method_receiver() {
    let mut rt = Runtime::new();
    let obj = rt.create_object().unwrap();
    let root = rt.own(obj);
    let name = rt.create_string("widget").unwrap();
    rt.set_prop(obj, "name", name).unwrap();
    rt.set_method(obj, "who", who).unwrap();

    let global = rt.global();
    rt.set_prop(global, "it", obj).unwrap();
    let v = rt.exec("it.who()").unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "widget");
    rt.disown(&root);
}

#[test]
fn apply_calls_a_script_function_from_the_host() {
    let mut rt = Runtime::new();
    rt.exec("function mul(a, b) { return a * b; }").unwrap();
    let global = rt.global();
    let f = rt.get_prop(global, "mul").unwrap();
    let v = rt
        .apply(f, global, &[Value::number(6.0), Value::number(7.0)])
        .unwrap();
    assert_eq!(v.as_number(), 42.0);
}

#[test]
fn missing_parameters_arrive_undefined() {
    let mut rt = Runtime::new();
    let v = rt
        .exec("function probe(a, b) { return b; } probe(1)")
        .unwrap();
    assert!(v.is_undefined());
}

#[test]
fn native_errors_propagate_as_script_exceptions_stay_host_errors() {
    let mut rt = Runtime::new();
    let global = rt.global();
    rt.set_method(global, "sum", sum).unwrap();
    // try_number failure inside the native is an InvalidArg host error,
    // not a script-catchable throw.
    let result = rt.exec("sum('nope')");
    assert!(matches!(result, Err(Error::InvalidArg(_))));
}

#[test]
fn bare_cfunction_values_are_callable() {
    let mut rt = Runtime::new();
    let cf = rt.create_cfunction(sum);
    assert!(cf.is_cfunction());
    let v = rt
        .apply(cf, Value::UNDEFINED, &[Value::number(2.0), Value::number(3.0)])
        .unwrap();
    assert_eq!(v.as_number(), 5.0);
}

#[test]
fn calling_a_non_function_throws() {
    let mut rt = Runtime::new();
    let result = rt.exec("var x = 5; x();");
    match result {
        Err(Error::Exception(v)) => {
            let msg = rt.error_message(v).unwrap();
            assert!(msg.contains("not a function"), "{msg}");
        }
        other => panic!("expected exception, got {other:?}"),
    }
}

#[test]
fn natives_can_reenter_the_interpreter() {
    fn call_twice(rt: &mut Runtime, _this: Value, args: &[Value]) -> Result<Value, Error> {
        let f = args[0];
        let a = rt.apply(f, Value::UNDEFINED, &[])?;
        let b = rt.apply(f, Value::UNDEFINED, &[])?;
        Ok(Value::number(a.try_number()? + b.try_number()?))
    }
    let mut rt = Runtime::new();
    let global = rt.global();
    rt.set_method(global, "twice", call_twice).unwrap();
    let v = rt
        .exec("var n = 0; twice(function () { n = n + 1; return n; })")
        .unwrap();
    assert_eq!(v.as_number(), 3.0);
}

#[test]
fn cfunction_values_from_another_runtime_are_rejected() {
    // A cfunction value carries only a table index; it is meaningless
    // in a runtime that never registered the callback.
    let mut producer = Runtime::new();
    let cf = producer.create_cfunction(sum);

    let mut rt = Runtime::new();
    match rt.apply(cf, Value::UNDEFINED, &[]) {
        Err(Error::Exception(v)) => {
            let msg = rt.error_message(v).unwrap();
            assert!(msg.contains("not a function"), "{msg}");
        }
        other => panic!("expected exception, got {other:?}"),
    }
}
