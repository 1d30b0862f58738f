use std::env;
use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use emplode::{EmplodeObject, Interpreter, TypeInfo};

/// A small in-scope host object demonstrating the type-registration
/// pattern described for `DataFile` in the original's worked example.
/// The original's own CSV-writing `DataFile` is out of scope here; this
/// stands in for it.
#[derive(Debug, Clone)]
struct Counter {
    count: f64,
}

impl EmplodeObject for Counter {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn counter_type() -> TypeInfo {
    let mut info = TypeInfo::new("Counter", "A simple incrementing counter.")
        .with_constructor(|_name| Box::new(Counter { count: 0.0 }))
        .with_copy(|obj| {
            let counter = obj.as_any().downcast_ref::<Counter>().expect("Counter copy");
            Box::new(counter.clone())
        });

    info.add_member_function("increment", "Add one to the counter.", |obj, table, _args| {
        let counter = obj.as_any_mut().downcast_mut::<Counter>().expect("Counter increment");
        counter.count += 1.0;
        Ok(table.make_temp_number(counter.count))
    });
    info.add_member_function("reset", "Set the counter back to zero.", |obj, table, _args| {
        let counter = obj.as_any_mut().downcast_mut::<Counter>().expect("Counter reset");
        counter.count = 0.0;
        Ok(table.make_temp_number(0.0))
    });

    info
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "main.emp" };
    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = Interpreter::new();
    interpreter.register_type(counter_type());

    if let Err(err) = interpreter.register_fn1("DOUBLE_IT", "Double a number.", |x| x * 2.0) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    if let Err(err) = interpreter.declare_signal("tick", 1) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    if let Err(err) = interpreter.load(file_path) {
        let elapsed = start.elapsed();
        eprintln!("error after: {elapsed:?}\n{err}");
        return ExitCode::FAILURE;
    }

    let tick = interpreter.make_temp_number(1.0);
    match interpreter.trigger("tick", &[tick]) {
        Ok(()) => {
            let elapsed = start.elapsed();
            eprintln!("success after: {elapsed:?}");
        }
        Err(err) => {
            eprintln!("error triggering 'tick': {err}");
            return ExitCode::FAILURE;
        }
    }

    println!("{}", interpreter.write());
    ExitCode::SUCCESS
}

fn read_file(file_path: &str) -> Result<String, String> {
    eprintln!("Reading file: {file_path}");
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("Error: {file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("Error reading {file_path}: {err}"));
        }
    }
    match fs::read_to_string(file_path) {
        Ok(contents) => Ok(contents),
        Err(err) => Err(format!("Error reading file: {err}")),
    }
}
