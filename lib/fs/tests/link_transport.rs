use std::cell::Cell;

use pretty_assertions::assert_eq;

use sapi_fs::appfs::{DEFAULT_MOUNT, PAGE_SIZE};
use sapi_fs::transport::{MemDevice, MemDeviceConfig};
use sapi_fs::{Appfs, AppfsInfo, Bitmap, Dir, ErrorKind, File, OpenFlags, Permissions, Transport};

fn mounted_device() -> MemDevice {
    let device = MemDevice::new();
    Dir::create(&device, DEFAULT_MOUNT, Permissions::DIRECTORY, false).unwrap();
    device
}

#[test]
fn reopen_does_not_leak_descriptors() {
    let device = MemDevice::new();
    for name in ["/a", "/b"] {
        let mut file = File::with_transport(&device);
        file.create(name, true, Permissions::FILE).unwrap();
        file.write(name.as_bytes()).unwrap();
    }

    let mut file = File::with_transport(&device);
    file.open("/a", OpenFlags::READ).unwrap();
    let old = file.fileno().unwrap();
    file.open("/b", OpenFlags::READ).unwrap();

    let err = device.fstat(old).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    assert_eq!(device.stats().open_files, 1);
}

#[test]
fn short_transfers_are_returned_as_is() {
    let device = MemDevice::with_config(MemDeviceConfig {
        max_transfer: Some(16),
        ..Default::default()
    })
    .unwrap();
    let mut file = File::with_transport(&device);
    file.create("/f", true, Permissions::FILE).unwrap();
    assert_eq!(file.write(&[1u8; 40]).unwrap(), 16);
    assert_eq!(file.size().unwrap(), 16);

    let mut buf = [0u8; 40];
    assert_eq!(file.read_at(0, &mut buf).unwrap(), 16);
    assert_eq!(device.stats().reads, 1);
}

#[test]
fn descriptor_limit_surfaces_as_open_error() {
    let device = MemDevice::with_config(MemDeviceConfig {
        max_open_files: 2,
        ..Default::default()
    })
    .unwrap();
    let mut first = File::with_transport(&device);
    first.create("/1", true, Permissions::FILE).unwrap();
    let mut second = File::with_transport(&device);
    second.create("/2", true, Permissions::FILE).unwrap();

    let mut third = File::with_transport(&device);
    let err = third.create("/3", true, Permissions::FILE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    assert_eq!(err.errno(), Some(libc::EMFILE));

    first.close().unwrap();
    third.create("/3", true, Permissions::FILE).unwrap();
}

#[test]
fn remote_cursors_refuse_positioning() {
    let device = MemDevice::new();
    Dir::create(&device, "/d/e", Permissions::DIRECTORY, true).unwrap();

    let mut dir = Dir::with_transport(&device);
    dir.open("/d").unwrap();
    assert_eq!(dir.count().unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(dir.tell().unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(dir.read_list().unwrap(), vec!["e"]);
}

#[test_log::test]
fn recursive_remove_clears_tree() {
    let device = MemDevice::new();
    Dir::create(&device, "/t/x/y", Permissions::DIRECTORY, true).unwrap();
    Dir::create(&device, "/t/z", Permissions::DIRECTORY, true).unwrap();
    for path in ["/t/1", "/t/x/2", "/t/x/y/3"] {
        let mut file = File::with_transport(&device);
        file.create(path, true, Permissions::FILE).unwrap();
        file.write(b"payload").unwrap();
    }

    Dir::remove(&device, "/t", true).unwrap();
    assert!(!Dir::exists(&device, "/t"));
    assert_eq!(Dir::list(&device, "/").unwrap(), Vec::<String>::new());
    assert_eq!(device.used(), 0);
}

#[test]
fn copy_guards_on_one_device() {
    let device = MemDevice::new();
    Dir::create(&device, "/src/inner", Permissions::DIRECTORY, true).unwrap();
    let mut file = File::with_transport(&device);
    file.create("/src/f", true, Permissions::FILE).unwrap();
    file.write(b"payload").unwrap();
    file.close().unwrap();

    let err = File::copy(&device, "/src/f", &device, "/src//f").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(device.contents("/src/f").unwrap(), b"payload");

    let err = Dir::copy(&device, "/src", &device, "/src/inner/copy").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    Dir::copy(&device, "/src", &device, "/copy").unwrap();
    assert_eq!(device.contents("/copy/f").unwrap(), b"payload");
    assert!(Dir::exists(&device, "/copy/inner"));

    // two devices never share files, whatever the paths
    let other = MemDevice::new();
    Dir::copy(&device, "/src", &other, "/src/inner").unwrap();
    assert_eq!(other.contents("/src/inner/f").unwrap(), b"payload");
}

#[test]
fn appfs_pages_and_progress() {
    let device = mounted_device();
    let data: Vec<u8> = (0..3 * PAGE_SIZE + 1).map(|i| i as u8).collect();

    let calls = Cell::new(0);
    let mut progress = |_current: usize, _total: usize| {
        calls.set(calls.get() + 1);
        true
    };
    let written = Appfs::create(&device, "x", &data, DEFAULT_MOUNT, Some(&mut progress)).unwrap();
    assert_eq!(written, data.len());
    assert_eq!(calls.get(), 4);
    assert_eq!(device.stats().writes, 4);

    let before = device.stats().writes;
    let mut stop_after_two = |current: usize, _total: usize| current < 2 * PAGE_SIZE;
    let written =
        Appfs::create(&device, "y", &data, DEFAULT_MOUNT, Some(&mut stop_after_two)).unwrap();
    assert_eq!(written, 2 * PAGE_SIZE);
    assert_eq!(device.stats().writes - before, 2);
    assert_eq!(device.contents("/app/y").unwrap(), &data[..2 * PAGE_SIZE]);
}

#[test]
fn appfs_version_read_back() {
    let device = mounted_device();
    let info = AppfsInfo::new("fonts", AppfsInfo::parse_version("2.3").unwrap());
    let image = Appfs::image(&info, &[0u8; 1000]).unwrap();
    Appfs::create(&device, "fonts", &image, DEFAULT_MOUNT, None).unwrap();

    assert_eq!(Appfs::get_version(&device, "/app/fonts").unwrap(), 0x0203);
    assert_eq!(
        Appfs::get_info(&device, "/app/fonts")
            .unwrap()
            .version_string(),
        "2.3"
    );
    assert_eq!(
        Appfs::cleanup(&device, DEFAULT_MOUNT, true).unwrap_err().kind(),
        ErrorKind::NotSupported
    );
}

#[test]
fn link_stat_classification() {
    let device = MemDevice::new();
    Dir::create(&device, "/dir", Permissions::new(0o700), false).unwrap();
    let stat = File::stat(&device, "/dir").unwrap();
    assert!(!stat.is_local());
    assert!(stat.is_directory());
    assert!(!stat.is_device());
    assert!(!stat.is_executable());
    assert_eq!(stat.permissions().bits(), 0o700);
}

#[test]
fn bitmap_through_link() {
    let device = MemDevice::new();
    let mut bitmap = Bitmap::new(9, 9);
    for i in 0..9 {
        bitmap.set(i, 8 - i, true);
    }
    bitmap.save(&device, "/diag.bmp").unwrap();
    assert_eq!(Bitmap::load_dim(&device, "/diag.bmp").unwrap(), (9, 9));
    let loaded = Bitmap::load(&device, "/diag.bmp").unwrap();
    assert!(loaded.get(0, 8));
    assert!(loaded.get(8, 0));
    assert!(!loaded.get(0, 0));
}
