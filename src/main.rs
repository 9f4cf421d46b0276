use std::{error::Error, sync::Arc};

use clap::{value_parser, Arg, ArgMatches, Command};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use device::{BlockFile, MemImage};
use jbod::{BlockDevice, Geometry, JbodDriver, JbodVolume, OpcodePort, MAX_IO_SIZE};

mod device;
mod jbod;
mod logger;
#[cfg(test)]
mod test;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    if let Err(err) = logger::init() {
        eprintln!("cannot install logger: {}", err);
    }
    if let Err(err) = jbod_cli() {
        eprintln!("jbod: {}", err);
        std::process::exit(1);
    }
}

fn cli() -> Command {
    let addr = Arg::new("addr")
        .short('a')
        .long("addr")
        .required(true)
        .value_parser(value_parser!(u32))
        .help("Start byte address inside the volume");

    Command::new("JBOD volume")
        .about("Byte-addressable volume over a linear array of disks, with a block cache")
        .subcommand_required(true)
        .arg(
            // 镜像文件路径
            Arg::new("image")
                .short('i')
                .long("image")
                .default_value("target/jbod.img")
                .help("Disk image file holding every disk back to back"),
        )
        .arg(
            Arg::new("disks")
                .long("disks")
                .value_parser(value_parser!(usize))
                .default_value("16")
                .help("Number of disks (1..=16)"),
        )
        .arg(
            Arg::new("blocks")
                .long("blocks")
                .value_parser(value_parser!(usize))
                .default_value("256")
                .help("Blocks per disk (1..=256)"),
        )
        .arg(
            Arg::new("cache")
                .short('c')
                .long("cache")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Block cache entries (2..=4096), 0 disables the cache"),
        )
        .subcommand(Command::new("format").about("Zero every block of the image"))
        .subcommand(
            Command::new("read")
                .about("Read bytes and print them as a hex dump")
                .arg(addr.clone())
                .arg(
                    Arg::new("len")
                        .short('l')
                        .long("len")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .help("Number of bytes to read (at most 1024)"),
                ),
        )
        .subcommand(
            Command::new("write")
                .about("Write a string at an address")
                .arg(addr)
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .required(true)
                        .help("Bytes to write, taken as UTF-8 text"),
                ),
        )
        .subcommand(
            Command::new("bench")
                .about("Run a random workload on an in-memory array and report the hit rate")
                .arg(
                    Arg::new("ops")
                        .long("ops")
                        .value_parser(value_parser!(usize))
                        .default_value("10000"),
                )
                .arg(Arg::new("seed").long("seed").value_parser(value_parser!(u64))),
        )
}

fn arg<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> CliResult<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| format!("missing argument --{}", id).into())
}

fn jbod_cli() -> CliResult<()> {
    let matches = cli().get_matches();
    let geometry = Geometry::new(arg(&matches, "disks")?, arg(&matches, "blocks")?)?;
    let cache: usize = arg(&matches, "cache")?;

    if let Some(("bench", sub)) = matches.subcommand() {
        let image = MemImage::new(geometry.total_blocks());
        let port = Arc::new(OpcodePort::new(JbodDriver::new(image, geometry)));
        let volume = open_volume(port.clone(), geometry, cache)?;
        bench(&volume, arg(sub, "ops")?, sub.get_one::<u64>("seed").copied())?;
        println!("{:?}", port.driver().io_counts());
        return Ok(());
    }

    let image_path: String = arg(&matches, "image")?;
    let image = BlockFile::open(&image_path, geometry.total_blocks())?;
    info!("opened {} with {:?}", image_path, geometry);
    let port = Arc::new(OpcodePort::new(JbodDriver::new(image, geometry)));
    let volume = open_volume(port.clone(), geometry, cache)?;

    match matches.subcommand() {
        Some(("format", _)) => {
            let zeros = [0u8; MAX_IO_SIZE];
            for addr in (0..geometry.capacity()).step_by(MAX_IO_SIZE) {
                let len = MAX_IO_SIZE.min(geometry.capacity() - addr);
                volume.write(addr as u32, &zeros[..len])?;
            }
            println!("formatted {} bytes", geometry.capacity());
        }
        Some(("read", sub)) => {
            let addr: u32 = arg(sub, "addr")?;
            let mut buf = vec![0u8; arg::<usize>(sub, "len")?];
            let len = volume.read(addr, &mut buf)?;
            print_hex(addr as usize, &buf[..len]);
        }
        Some(("write", sub)) => {
            let addr: u32 = arg(sub, "addr")?;
            let data: String = arg(sub, "data")?;
            let len = volume.write(addr, data.as_bytes())?;
            println!("wrote {} bytes at {}", len, addr);
        }
        _ => unreachable!("subcommand is required"),
    }

    if volume.cache_enabled() {
        eprintln!("{}", cache_report(&volume));
    }
    volume.unmount()?;
    info!("{:?}", port.driver().io_counts());
    Ok(())
}

/// 挂载卷并打开写权限, cache 不为 0 时创建块缓存
fn open_volume(
    device: Arc<dyn BlockDevice>,
    geometry: Geometry,
    cache: usize,
) -> CliResult<JbodVolume> {
    let volume = JbodVolume::new(device, geometry);
    if cache > 0 {
        volume.create_cache(cache)?;
    }
    volume.mount()?;
    volume.grant_write()?;
    Ok(volume)
}

/// 缓存容量和命中统计, 没有缓存时只有一行说明
fn cache_report(volume: &JbodVolume) -> String {
    if !volume.cache_enabled() {
        return "cache disabled".to_string();
    }
    format!("{} cache entries, {}", volume.cache_capacity(), volume.cache_stats())
}

fn print_hex(base: usize, bytes: &[u8]) {
    for (i, line) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        let text: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<47}  {}", base + i * 16, hex.join(" "), text);
    }
}

/// 随机读写负载: 八成请求落在前 1/8 的 "热" 地址上
fn bench(volume: &JbodVolume, ops: usize, seed: Option<u64>) -> CliResult<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let capacity = volume.geometry().capacity();
    let hot = (capacity / 8).max(MAX_IO_SIZE).min(capacity);
    let mut buf = vec![0u8; MAX_IO_SIZE];
    let (mut reads, mut writes) = (0usize, 0usize);

    for _ in 0..ops {
        let span = if rng.gen_bool(0.8) { hot } else { capacity };
        let len = rng.gen_range(1..=MAX_IO_SIZE.min(span));
        let addr = rng.gen_range(0..=span - len) as u32;
        if rng.gen_bool(0.3) {
            rng.fill(&mut buf[..len]);
            volume.write(addr, &buf[..len])?;
            writes += 1;
        } else {
            volume.read(addr, &mut buf[..len])?;
            reads += 1;
        }
    }

    println!("{} reads, {} writes", reads, writes);
    println!("{}", cache_report(volume));
    volume.unmount()?;
    Ok(())
}
