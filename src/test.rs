#![allow(unused)]
use super::device;
use super::jbod;
use device::{BlockFile, MemImage};
use jbod::{
    BlockDevice, CacheStats, DiskImage, Geometry, JbodDriver, JbodError, JbodVolume, OpcodePort,
    BLOCK_SIZE, MAX_IO_SIZE,
};
use rand::Rng;
use std::io;
use std::sync::Arc;

type Port<I> = Arc<OpcodePort<JbodDriver<I>>>;

/// 2 块磁盘, 每块 4 个块, 共 2048 字节
fn small_geometry() -> Geometry {
    Geometry::new(2, 4).unwrap()
}

/// 在镜像上搭一个已 mount 且可写的卷, cache 为 0 表示不开缓存
fn setup<I: DiskImage>(image: I, geometry: Geometry, cache: usize) -> (Port<I>, JbodVolume) {
    let port = Arc::new(OpcodePort::new(JbodDriver::new(image, geometry)));
    let volume = JbodVolume::new(port.clone(), geometry);
    if cache > 0 {
        volume.create_cache(cache).unwrap();
    }
    volume.mount().unwrap();
    volume.grant_write().unwrap();
    (port, volume)
}

fn mem_volume(cache: usize) -> (Port<MemImage>, JbodVolume) {
    let geometry = small_geometry();
    setup(MemImage::new(geometry.total_blocks()), geometry, cache)
}

#[test]
fn write_then_read_inside_one_block() {
    let (port, volume) = mem_volume(2);
    let before = port.driver().io_counts();

    // 地址 300 = disk 0, block 1, offset 44
    let data = *b"0123456789";
    assert_eq!(volume.write(300, &data), Ok(10));
    let after_write = port.driver().io_counts();
    assert_eq!(after_write.reads - before.reads, 1);
    assert_eq!(after_write.writes - before.writes, 1);

    let mut out = [0u8; 10];
    assert_eq!(volume.read(300, &mut out), Ok(10));
    assert_eq!(out, data);
    // 写的时候块已经进了缓存, 这次读不需要访问设备
    assert_eq!(port.driver().io_counts().reads, after_write.reads);
    assert_eq!(volume.cache_stats(), CacheStats { hits: 1, queries: 1 });

    // 落在设备上的字节也正确
    let mut block = jbod::Block::zeroed();
    port.read_block(0, 1, &mut block).unwrap();
    assert_eq!(&block[44..54], &data);
}

#[test]
fn write_keeps_cached_block_coherent() {
    let (_, volume) = mem_volume(2);
    let mut out = [0u8; 16];
    volume.read(0, &mut out).unwrap();
    assert_eq!(volume.cache_stats(), CacheStats { hits: 0, queries: 1 });

    let data = [0x5au8; 16];
    volume.write(0, &data).unwrap();
    let before = volume.cache_stats();
    volume.read(0, &mut out).unwrap();
    assert_eq!(out, data);
    assert_eq!(volume.cache_stats().hits - before.hits, 1);
}

#[test]
fn zero_length_touches_nothing() {
    let (port, volume) = mem_volume(2);
    let before = port.driver().io_counts();
    assert_eq!(volume.read(100, &mut []), Ok(0));
    assert_eq!(volume.write(100, &[]), Ok(0));
    // 地址越界也无所谓, 长度为 0 直接返回
    assert_eq!(volume.read(u32::MAX, &mut []), Ok(0));
    assert_eq!(port.driver().io_counts(), before);
    assert_eq!(volume.cache_stats(), CacheStats::default());
}

#[test]
fn out_of_range_touches_no_device() {
    let (port, volume) = mem_volume(0);
    let before = port.driver().io_counts();
    let mut out = [0u8; 16];
    assert!(matches!(volume.read(2040, &mut out), Err(JbodError::OutOfRange { .. })));
    assert!(matches!(volume.write(2047, &out), Err(JbodError::OutOfRange { .. })));
    assert!(matches!(
        volume.read(0, &mut [0u8; MAX_IO_SIZE + 1]),
        Err(JbodError::InvalidArgument(_))
    ));
    assert_eq!(port.driver().io_counts(), before);
}

#[test]
fn straddles_blocks_and_disks() {
    let (port, volume) = mem_volume(0);
    // [900, 1200) 横跨 disk 0 的 block 3 和 disk 1 的 block 0, 1
    let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
    assert_eq!(volume.write(900, &data), Ok(300));

    let mut out = vec![0u8; 300];
    assert_eq!(volume.read(900, &mut out), Ok(300));
    assert_eq!(out, data);

    let mut block = jbod::Block::zeroed();
    port.read_block(1, 0, &mut block).unwrap();
    assert_eq!(block[0], data[1024 - 900]);
}

#[test]
fn works_without_cache() {
    let (_, volume) = mem_volume(0);
    assert!(!volume.cache_enabled());
    volume.write(5, b"no cache").unwrap();
    let mut out = [0u8; 8];
    volume.read(5, &mut out).unwrap();
    assert_eq!(&out, b"no cache");
    assert_eq!(volume.cache_stats(), CacheStats::default());
}

#[test]
fn cache_can_be_destroyed_mid_session() {
    let (_, volume) = mem_volume(4);
    volume.write(0, &[1u8; 600]).unwrap();
    assert_eq!(volume.create_cache(4), Err(JbodError::AlreadyExists));
    volume.destroy_cache().unwrap();
    assert_eq!(volume.destroy_cache(), Err(JbodError::NotInitialized));

    let mut out = [0u8; 600];
    volume.read(0, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 1));
    assert_eq!(volume.cache_stats(), CacheStats::default());
}

/// 对某一个线性块的写操作总是失败的镜像
struct FailingImage {
    inner: MemImage,
    bad_block: usize,
}

impl DiskImage for FailingImage {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        if block_id == self.bad_block {
            return Err(io::Error::new(io::ErrorKind::Other, "bad block"));
        }
        self.inner.write_block(block_id, buf)
    }
}

#[test]
fn failed_segment_keeps_earlier_segments() {
    let geometry = small_geometry();
    let image = FailingImage {
        inner: MemImage::new(geometry.total_blocks()),
        bad_block: 2,
    };
    let (port, volume) = setup(image, geometry, 2);

    // [300, 700) 覆盖 block 1 和 block 2, 第二段写失败
    let err = volume.write(300, &[9u8; 400]).unwrap_err();
    assert!(matches!(err, JbodError::DeviceError(op) if op.block_id == 2));

    let mut out = [0u8; 212];
    volume.read(300, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 9));
    let mut rest = [0u8; 188];
    volume.read(512, &mut rest).unwrap();
    assert!(rest.iter().all(|&b| b == 0));
}

#[test]
fn file_image_survives_reopen() -> std::io::Result<()> {
    let geometry = small_geometry();
    let path = "target/jbod-reopen-test.img";
    std::fs::create_dir_all("target")?;
    let _ = std::fs::remove_file(path);

    {
        let (_, volume) = setup(BlockFile::open(path, geometry.total_blocks())?, geometry, 2);
        volume.write(1020, b"across disks").unwrap();
        volume.unmount().unwrap();
    }

    let (_, volume) = setup(BlockFile::open(path, geometry.total_blocks())?, geometry, 2);
    let mut out = [0u8; 12];
    volume.read(1020, &mut out).unwrap();
    assert_eq!(&out, b"across disks");
    Ok(())
}

#[test]
fn random_io_matches_shadow() {
    let geometry = Geometry::default();
    let (_, volume) = setup(MemImage::new(geometry.total_blocks()), geometry, 64);
    let capacity = geometry.capacity();
    let mut shadow = vec![0u8; capacity];
    let mut rng = rand::thread_rng();

    for _ in 0..3000 {
        let len = rng.gen_range(1..=MAX_IO_SIZE);
        // 一半请求集中在前 8 个块上, 让缓存有机会命中
        let span = if rng.gen_bool(0.5) { 8 * BLOCK_SIZE } else { capacity };
        let addr = rng.gen_range(0..=span - len);
        if rng.gen_bool(0.4) {
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            assert_eq!(volume.write(addr as u32, &data), Ok(len));
            shadow[addr..addr + len].copy_from_slice(&data);
        } else {
            let mut out = vec![0u8; len];
            assert_eq!(volume.read(addr as u32, &mut out), Ok(len));
            assert_eq!(out, &shadow[addr..addr + len]);
        }
    }
    assert!(volume.cache_stats().hits > 0);
}

#[test]
fn cache_report_shows_capacity() {
    let (_, volume) = mem_volume(0);
    assert_eq!(super::cache_report(&volume), "cache disabled");
    assert_eq!(volume.cache_capacity(), 0);

    volume.create_cache(3).unwrap();
    assert_eq!(volume.cache_capacity(), 3);
    volume.read(0, &mut [0u8; 4]).unwrap();
    volume.read(0, &mut [0u8; 4]).unwrap();
    let report = super::cache_report(&volume);
    assert!(report.starts_with("3 cache entries, num_hits: 1, num_queries: 2"));
    assert!(report.ends_with("Hit rate:  50.0%"));
}

#[test]
fn file_image_is_laid_out_disk_after_disk() -> std::io::Result<()> {
    let geometry = small_geometry();
    let path = "target/jbod-layout-test.img";
    std::fs::create_dir_all("target")?;
    let _ = std::fs::remove_file(path);

    {
        let (_, volume) = setup(BlockFile::open(path, geometry.total_blocks())?, geometry, 0);
        // disk 1, block 2, offset 5
        let addr = geometry.disk_size() + 2 * BLOCK_SIZE + 5;
        volume.write(addr as u32, b"jbod").unwrap();
    }

    let raw = std::fs::read(path)?;
    assert_eq!(raw.len(), geometry.capacity());
    let at = (1 * geometry.blocks_per_disk() + 2) * BLOCK_SIZE + 5;
    assert_eq!(&raw[at..at + 4], b"jbod");
    assert_eq!(raw.iter().filter(|&&b| b != 0).count(), 4);
    Ok(())
}
