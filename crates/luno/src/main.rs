use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use luno_compiler::{compile, disasm};
use luno_core::chunk;
use luno_core::proto::Prototype;
use luno_core::table::Table;
use luno_core::value::{LuaStr, Value};
use luno_vm::error::LuaError;
use luno_vm::vm::Vm;

#[derive(Default)]
struct CliOptions {
    script: Option<String>,
    /// `-e` statements, in order.
    chunks: Vec<String>,
    list: bool,
    dump_to: Option<String>,
    version: bool,
    script_args: Vec<String>,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = parse_cli(&args);

    if opts.version {
        println!("Luno 0.1.0 -- Lua 5.3 (compatible)");
    }

    // -l and -o compile without executing, like luac.
    if opts.list || opts.dump_to.is_some() {
        compile_only(&opts);
        return;
    }

    if opts.script.is_none() && opts.chunks.is_empty() {
        if opts.version {
            return;
        }
        if stdin_is_tty() {
            print_usage();
            return;
        }
        // Piped input
        let mut vm = create_vm(None, &[]);
        let stdin = read_stdin();
        if let Err(e) = run_chunk(&mut vm, &stdin, "=stdin", Vec::new()) {
            fail(&e.to_string());
        }
        return;
    }

    let mut vm = create_vm(opts.script.as_deref(), &opts.script_args);

    for stat in &opts.chunks {
        if let Err(e) = run_chunk(&mut vm, stat.as_bytes(), "=(command line)", Vec::new()) {
            fail(&e.to_string());
        }
    }

    if let Some(path) = &opts.script {
        let (source, name) = read_script(path);
        let varargs: Vec<Value> = opts
            .script_args
            .iter()
            .map(|a| Value::Str(LuaStr::from_str(a)))
            .collect();
        if let Err(e) = run_chunk(&mut vm, &source, &name, varargs) {
            fail(&e.to_string());
        }
    }
}

fn parse_cli(mut rest: &[String]) -> CliOptions {
    let mut opts = CliOptions::default();
    while let [arg, tail @ ..] = rest {
        rest = tail;
        match arg.as_str() {
            "--" => {
                // First remaining word is the script, the rest its arguments
                if let [script, more @ ..] = rest {
                    opts.script = Some(script.clone());
                    opts.script_args = more.to_vec();
                }
                break;
            }
            "-v" => opts.version = true,
            "-l" => opts.list = true,
            "-e" => match rest {
                [stat, tail @ ..] => {
                    opts.chunks.push(stat.clone());
                    rest = tail;
                }
                [] => fail("'-e' needs argument"),
            },
            "-o" => match rest {
                [path, tail @ ..] => {
                    opts.dump_to = Some(path.clone());
                    rest = tail;
                }
                [] => fail("'-o' needs argument"),
            },
            // Combined forms like -e"code"
            other if other.starts_with("-e") && other.len() > 2 => {
                opts.chunks.push(other[2..].to_string());
            }
            other if other.starts_with("-o") && other.len() > 2 => {
                opts.dump_to = Some(other[2..].to_string());
            }
            other if other.starts_with('-') && other != "-" => {
                eprintln!("luno: unrecognized option '{other}'");
                print_usage();
                std::process::exit(1);
            }
            script => {
                // Everything after the script name belongs to the script
                opts.script = Some(script.to_string());
                opts.script_args = rest.to_vec();
                break;
            }
        }
    }
    opts
}

fn compile_only(opts: &CliOptions) {
    let (source, name) = match (&opts.script, opts.chunks.as_slice()) {
        (Some(path), []) => read_script(path),
        (None, [stat]) => (stat.clone().into_bytes(), "=(command line)".to_string()),
        _ => fail("'-l' and '-o' take one script or one '-e' chunk"),
    };
    let proto = match load_proto(&source, &name) {
        Ok(p) => p,
        Err(e) => fail(&e.to_string()),
    };
    if opts.list {
        print!("{}", disasm::disassemble(&proto));
    }
    if let Some(out) = &opts.dump_to {
        if let Err(e) = std::fs::write(out, chunk::dump(&proto)) {
            fail(&format!("cannot write {out}: {e}"));
        }
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("luno: {msg}");
    std::process::exit(1);
}

fn print_usage() {
    eprintln!("usage: luno [options] [script [args]]");
    eprintln!("  -e stat  execute string 'stat'");
    eprintln!("  -l       list compiled bytecode instead of executing");
    eprintln!("  -o file  write the compiled binary chunk to 'file'");
    eprintln!("  -v       show version information");
    eprintln!("  --       stop handling options");
    eprintln!("  -        execute stdin");
}

fn create_vm(script: Option<&str>, script_args: &[String]) -> Vm {
    let vm = Vm::new();

    // `arg` table: arg[0] is the script, arg[1..] its arguments, arg[-1]
    // the interpreter.
    let arg_table = Rc::new(RefCell::new(Table::new()));
    {
        let mut t = arg_table.borrow_mut();
        t.raw_seti(-1, Value::Str(LuaStr::from_str("luno")));
        if let Some(path) = script {
            t.raw_seti(0, Value::Str(LuaStr::from_str(path)));
        }
        for (j, a) in script_args.iter().enumerate() {
            t.raw_seti((j + 1) as i64, Value::Str(LuaStr::from_str(a)));
        }
    }
    vm.globals()
        .borrow_mut()
        .raw_set_str(LuaStr::from_str("arg"), Value::Table(arg_table));

    vm
}

fn run_chunk(vm: &mut Vm, source: &[u8], name: &str, args: Vec<Value>) -> Result<(), LuaError> {
    let main = vm.load_chunk(source, name)?;
    vm.call(main, args)?;
    Ok(())
}

fn load_proto(source: &[u8], name: &str) -> Result<Rc<Prototype>, LuaError> {
    if chunk::is_binary_chunk(source) {
        Ok(Rc::new(chunk::undump(source)?))
    } else {
        Ok(compile(source, name)?)
    }
}

fn read_script(path: &str) -> (Vec<u8>, String) {
    if path == "-" {
        return (read_stdin(), "=stdin".to_string());
    }
    match std::fs::read(path) {
        Ok(data) => (strip_shebang(&data).to_vec(), format!("@{path}")),
        Err(e) => fail(&format!("cannot open {path}: {e}")),
    }
}

fn read_stdin() -> Vec<u8> {
    let mut buf = Vec::new();
    match std::io::stdin().read_to_end(&mut buf) {
        Ok(_) => buf,
        Err(e) => fail(&format!("cannot read stdin: {e}")),
    }
}

fn strip_shebang(source: &[u8]) -> &[u8] {
    if !source.starts_with(b"#") {
        return source;
    }
    // The shebang line runs to the first newline, or to end of input.
    match source.iter().position(|&b| b == b'\n') {
        Some(nl) => &source[nl + 1..],
        None => b"",
    }
}

fn stdin_is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}
