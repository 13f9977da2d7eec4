use std::sync::Arc;

use hylla::{
    console::StdConsole,
    fs::Filesystem,
    kernel::{
        Kernel,
        file::{CONSOLE_INPUT, CONSOLE_OUTPUT, FileDescriptor},
    },
};

fn usage() -> ! {
    eprintln!("hylla-shell");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    if std::env::args().nth(1).is_some() {
        eprintln!("hylla-shell: too many arguments");
        usage();
    }

    let fs = Arc::new(Filesystem::new());
    let kernel = Kernel::new(fs, Arc::new(StdConsole));

    print(&kernel, b"hylla shell; 'help' lists commands\n");
    let mut line = Vec::new();
    while read_line(&kernel, &mut line) {
        let line = String::from_utf8_lossy(&line);
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };

        match command {
            "ls" => {
                for name in kernel.filesystem().names() {
                    print(&kernel, name.as_bytes());
                    print(&kernel, b"\n");
                }
            }

            "cat" => match words.next() {
                Some(name) => cat(&kernel, name),
                None => eprintln!("hylla-shell: cat: missing file name"),
            },

            "write" => {
                let Some(name) = words.next() else {
                    eprintln!("hylla-shell: write: missing file name");
                    continue;
                };
                let text: Vec<&str> = words.collect();
                write(&kernel, name, text.join(" ").as_bytes());
            }

            "rm" => match words.next() {
                Some(name) => {
                    if let Err(err) = kernel.unlink(name) {
                        report("rm", name, err);
                    }
                }
                None => eprintln!("hylla-shell: rm: missing file name"),
            },

            "help" => {
                print(
                    &kernel,
                    b"commands: ls | cat NAME | write NAME TEXT | rm NAME | exit\n",
                );
            }

            "exit" => break,

            other => {
                eprintln!("hylla-shell: unknown command {other:?}");
            }
        }
    }
}

/// Accumulates one input line through the syscall surface. Returns false
/// once input is exhausted and no bytes are pending.
fn read_line(kernel: &Kernel, line: &mut Vec<u8>) -> bool {
    line.clear();
    let mut byte = [0u8; 1];
    loop {
        match kernel.read(CONSOLE_INPUT, &mut byte) {
            Ok(1) => {
                if byte[0] == b'\n' {
                    return true;
                }
                line.push(byte[0]);
            }
            _ => return !line.is_empty(),
        }
    }
}

fn print(kernel: &Kernel, bytes: &[u8]) {
    if let Err(err) = kernel.write(CONSOLE_OUTPUT, bytes) {
        report("write", "console", err);
    }
}

fn cat(kernel: &Kernel, name: &str) {
    let fd = match kernel.open(name) {
        Ok(fd) => fd,
        Err(err) => return report("cat", name, err),
    };

    let mut buf = [0u8; 256];
    loop {
        match kernel.read(fd, &mut buf) {
            Ok(0) => break,
            Ok(count) => print(kernel, &buf[..count]),
            Err(err) => {
                report("cat", name, err);
                break;
            }
        }
    }
    print(kernel, b"\n");
    close(kernel, name, fd);
}

fn write(kernel: &Kernel, name: &str, text: &[u8]) {
    let fd = match kernel.creat(name) {
        Ok(fd) => fd,
        Err(err) => return report("write", name, err),
    };
    if let Err(err) = kernel.write(fd, text) {
        report("write", name, err);
    }
    close(kernel, name, fd);
}

fn close(kernel: &Kernel, name: &str, fd: FileDescriptor) {
    if let Err(err) = kernel.close(fd) {
        report("close", name, err);
    }
}

fn report(command: &str, name: &str, err: hylla::kernel::Error) {
    eprintln!(
        "hylla-shell: {command} {name}: {}",
        std::io::Error::from_raw_os_error(err.into())
    );
}
