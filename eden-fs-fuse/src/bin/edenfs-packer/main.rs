mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use eden_fs::{EdenFileSystem, OpenMode, BLOCK_SIZE};
use eden_fs_fuse::BlockFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let image = cli.out_dir.join("fs.img");
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&image)?;
    fd.set_len(u64::from(cli.blocks) * BLOCK_SIZE as u64)?;

    let block_file = Arc::new(BlockFile::new(fd));
    let mut efs = EdenFileSystem::format(block_file, cli.blocks)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("format failed: {e:?}")))?;
    println!("image={image:?} blocks={}", cli.blocks);

    if let Some(source) = &cli.source {
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_str().expect("source file name is not UTF-8");

            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;

            let path = format!("/{name}");
            let file = efs
                .open(&path, OpenMode::Write)
                .expect("image write failed")
                .expect("packed file should resolve");
            efs.write_to_file(&file, &data).expect("image write failed");
            log::info!("packed {path} ({} bytes)", data.len());
        }
    }

    print!("{}", efs.list("/", true, true).expect("image read failed"));

    Ok(())
}
