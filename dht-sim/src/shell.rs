//! Interactive read-eval-print loop over the running network. Modeled on
//! a plain synchronous command loop: no external line-editing crate, no
//! lock held across commands, and its own small command-history buffer.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use dht_core::KeyInt;
use rand::SeedableRng;
use tracing::warn;

use crate::driver::Network;

pub struct Shell {
    network: Network,
    current: usize,
    verbose: bool,
    history: Vec<String>,
    running: bool,
}

impl Shell {
    pub fn new(network: Network) -> Shell {
        Shell {
            network,
            current: 0,
            verbose: false,
            history: Vec::new(),
            running: true,
        }
    }

    /// Runs the loop until `quit` or EOF on stdin. Returns the process
    /// exit code (0 for a normal quit or EOF, 1 for a usage error during
    /// a single command is still 0 overall — only startup-level failures
    /// in `main` produce a nonzero exit).
    pub async fn run(mut self) -> i32 {
        let stdin = io::stdin();
        print_banner(&self.network);

        while self.running {
            print!("dht-sim> ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            let bytes = stdin.read_line(&mut line).unwrap_or(0);
            if bytes == 0 {
                println!();
                break;
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.clone());
            self.dispatch(&line).await;
        }

        0
    }

    async fn dispatch(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(c) => c,
            None => return,
        };
        let args: Vec<&str> = parts.collect();

        match command {
            "help" => self.cmd_help(),
            "quit" | "exit" => self.running = false,
            "jump" => self.cmd_jump(&args),
            "show" => self.cmd_show(),
            "lookup" => self.cmd_lookup(&args).await,
            "find_nearest" => self.cmd_find_nearest(&args),
            "rand_node" => self.cmd_rand_node(),
            "rand_key" => self.cmd_rand_key(),
            "save" => self.cmd_save(&args),
            "graphviz" => self.cmd_graphviz(&args),
            "verbose" => self.cmd_verbose(&args),
            "bit_length" => self.cmd_bit_length(&args),
            "xor" => self.cmd_xor(&args),
            "cheat_lookup" => self.cmd_cheat_lookup(&args).await,
            "buy_storage" | "put_bytes" | "get_bytes" => self.cmd_external_stub(command),
            other => println!("unknown command {other:?}; try `help`"),
        }
    }

    fn cmd_help(&self) {
        println!(
            "commands: help quit jump show lookup find_nearest rand_node rand_key \
             save graphviz verbose bit_length xor cheat_lookup \
             buy_storage put_bytes get_bytes"
        );
    }

    fn cmd_jump(&mut self, args: &[&str]) {
        let Some(hex) = args.first() else {
            println!("usage: jump <hex-id>");
            return;
        };
        let id = match KeyInt::from_hex(hex) {
            Ok(id) => id,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        match self.network.ids.iter().position(|candidate| *candidate == id) {
            Some(index) => {
                self.current = index;
                println!("now at node {index} ({hex})");
            }
            None => println!("no node with id {hex}"),
        }
    }

    fn cmd_show(&self) {
        let index = self.current;
        println!("node {index} id={}", self.network.ids[index].to_hex());
    }

    async fn cmd_lookup(&self, args: &[&str]) {
        let Some(hex) = args.first() else {
            println!("usage: lookup <hex-key>");
            return;
        };
        let key = match KeyInt::from_hex(hex) {
            Ok(key) => key,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        let node = self.network.nodes[self.current].read().await;
        let result = node.node_lookup(key).await;
        for addr in result {
            println!("{}", addr.id.to_hex());
        }
    }

    fn cmd_find_nearest(&self, args: &[&str]) {
        let (Some(hex), Some(n)) = (args.first(), args.get(1)) else {
            println!("usage: find_nearest <hex-key> <n>");
            return;
        };
        let key = match KeyInt::from_hex(hex) {
            Ok(key) => key,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        let n: u32 = match n.parse() {
            Ok(n) => n,
            Err(_) => {
                println!("{n:?} is not a valid count");
                return;
            }
        };
        let index = self.current;
        let result = self
            .network
            .nodes
            .get(index)
            .expect("current index always in range");
        // `find_closest` only needs a read lock, taken synchronously here
        // via try_read since this command never contends with a writer.
        match result.try_read() {
            Ok(node) => {
                for addr in node.find_closest(key, n) {
                    println!("{}", addr.id.to_hex());
                }
            }
            Err(_) => println!("node is busy, try again"),
        }
    }

    fn cmd_rand_node(&mut self) {
        use rand::Rng;
        let mut rng = rand::rngs::StdRng::from_entropy();
        self.current = rng.gen_range(0..self.network.nodes.len());
        println!("now at node {}", self.current);
    }

    fn cmd_rand_key(&self) {
        let mut rng = rand::rngs::StdRng::from_entropy();
        println!("{}", KeyInt::random(&mut rng).to_hex());
    }

    fn cmd_save(&self, args: &[&str]) {
        let Some(path) = args.first() else {
            println!("usage: save <file>");
            return;
        };
        if let Err(e) = self.write_dump(path) {
            println!("failed to save: {e}");
        } else {
            println!("wrote {path}");
        }
    }

    fn write_dump(&self, path: &str) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        // Synchronous borrow: the dump only reads already-settled routing
        // state and is only ever reachable from the single shell task, so
        // a blocking `try_read` is safe here.
        let mut guards = Vec::with_capacity(self.network.nodes.len());
        for handle in &self.network.nodes {
            guards.push(handle.try_read().map_err(|_| {
                io::Error::new(io::ErrorKind::WouldBlock, "a node is mid-RPC, retry")
            })?);
        }
        let refs: Vec<&dht_core::NodeCore> = guards.iter().map(|g| &**g).collect();
        let config = refs[0].config();
        dht_core::persist::dump_network(&mut writer, config, &refs)
    }

    fn cmd_graphviz(&self, args: &[&str]) {
        let Some(path) = args.first() else {
            println!("usage: graphviz <file>");
            return;
        };
        let result = File::create(path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            let mut guards = Vec::with_capacity(self.network.nodes.len());
            for handle in &self.network.nodes {
                guards.push(handle.try_read().map_err(|_| {
                    io::Error::new(io::ErrorKind::WouldBlock, "a node is mid-RPC, retry")
                })?);
            }
            let refs: Vec<&dht_core::NodeCore> = guards.iter().map(|g| &**g).collect();
            dht_core::persist::dump_graphviz(&mut writer, &refs)
        });
        match result {
            Ok(()) => println!("wrote {path}"),
            Err(e) => println!("failed to save: {e}"),
        }
    }

    fn cmd_verbose(&mut self, args: &[&str]) {
        match args.first() {
            Some(&"1") => {
                self.verbose = true;
                println!("verbose on");
            }
            Some(&"0") => {
                self.verbose = false;
                println!("verbose off");
            }
            _ => println!("usage: verbose 0|1"),
        }
    }

    fn cmd_bit_length(&self, args: &[&str]) {
        let Some(hex) = args.first() else {
            println!("usage: bit_length <hex>");
            return;
        };
        match KeyInt::from_hex(hex) {
            Ok(key) => println!("{}", key.bit_length()),
            Err(e) => println!("{e}"),
        }
    }

    fn cmd_xor(&self, args: &[&str]) {
        let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
            println!("usage: xor <hex> <hex>");
            return;
        };
        match (KeyInt::from_hex(a), KeyInt::from_hex(b)) {
            (Ok(a), Ok(b)) => println!("{}", a.xor(&b).to_hex()),
            (Err(e), _) | (_, Err(e)) => println!("{e}"),
        }
    }

    /// Ground-truth nearest-k via a linear scan over every registered id,
    /// bypassing routing tables entirely. Used to validate `lookup`.
    async fn cmd_cheat_lookup(&self, args: &[&str]) {
        let Some(hex) = args.first() else {
            println!("usage: cheat_lookup <hex-key>");
            return;
        };
        let key = match KeyInt::from_hex(hex) {
            Ok(key) => key,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        let k = self.network.nodes[self.current].read().await.config().k;
        let mut ids: Vec<KeyInt> = self.network.ids.clone();
        ids.sort_by_key(|id| key.xor(id));
        for id in ids.into_iter().take(k as usize) {
            println!("{}", id.to_hex());
        }
    }

    fn cmd_external_stub(&self, command: &str) {
        warn!(command, "external operation is outside the simulator's scope");
        println!("{command}: not implemented by the simulator, no node state changed");
    }
}

fn print_banner(network: &Network) {
    println!(
        "dht-sim: {} peers, B={} k={} alpha={}",
        network.nodes.len(),
        network.nodes[0].try_read().map(|n| n.config().b).unwrap_or(0),
        network.nodes[0].try_read().map(|n| n.config().k).unwrap_or(0),
        network.nodes[0].try_read().map(|n| n.config().alpha).unwrap_or(0),
    );
    println!("type `help` for a list of commands");
}
